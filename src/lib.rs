//! Seed-chain-align core for mapping long reads against a prebuilt
//! minimizer index.
//!
//! This crate implements the colinear chaining mapping core only: seed
//! lookup, anchor construction, sparse DP chaining, and chain
//! post-processing (parent/primary/secondary assignment, long-chain
//! joining, mapping quality). Index construction, minimizer sketching,
//! low-complexity masking, base-level alignment, sequence I/O, and PAF/SAM
//! serialization are external collaborators, expressed here as traits
//! ([`index::Index`], [`sketch::Sketcher`], [`lowcomplexity::LowComplexityDetector`],
//! [`align::Aligner`], [`io::SequenceReader`], [`io::Serializer`]) so a caller
//! can plug in whichever concrete implementation fits its index format and
//! I/O stack.
//!
//! [`query::QueryPipeline`] composes the per-query steps; [`batch::BatchPipeline`]
//! wraps it in a bounded, three-stage read/map/write pipeline for mapping an
//! entire input stream against a shared index.

pub mod align;
pub mod anchor;
pub mod arena;
pub mod batch;
pub mod chain;
pub mod error;
pub mod index;
pub mod io;
pub mod lowcomplexity;
pub mod options;
pub mod postproc;
pub mod query;
pub mod sketch;
pub mod strand;

pub use align::{Aligner, MappingRecord, NoAligner};
pub use anchor::{Anchor, AnchorBuilder};
pub use arena::ScratchArena;
pub use batch::{BatchPipeline, MappedQuery};
pub use chain::{Chain, ChainParams, Chainer};
pub use error::MapError;
pub use index::{Hits, Index, IndexHit};
pub use io::{Batch, Query, SequenceReader, Serializer};
pub use lowcomplexity::{filter_low_complexity, Interval, LowComplexityDetector};
pub use options::{OptFlags, Options};
pub use postproc::{ChainPostproc, PostprocParams};
pub use query::QueryPipeline;
pub use sketch::{Minimizer, Sketcher};
pub use strand::Strand;
