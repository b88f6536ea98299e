//! Per-worker scratch arena.
//!
//! Safe Rust has no cheap analogue of a raw-pointer bump allocator that is
//! worth reaching for here: reusing `Vec` buffers across queries gives the
//! same "one allocation amortized over the whole run" property without
//! `unsafe`. Every per-query intermediate (anchors, chains) lives in one of
//! these buffers and is released by truncating to zero at the start of the
//! next query, not by `drop`ping the allocation.

use crate::anchor::Anchor;
use crate::chain::Chain;
use crate::error::MapError;

/// Soft ceiling on anchors held per query, so pathological inputs (a query
/// that hits an enormous number of over-frequent minimizers) fail with
/// `MapError::AllocFailure` instead of growing the process without bound.
const MAX_ANCHORS_PER_QUERY: usize = 4_000_000;

#[derive(Debug, Default)]
pub struct ScratchArena {
    pub anchors: Vec<Anchor>,
    pub chains: Vec<Chain>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for `n` more anchors, failing if the per-query budget
    /// would be exceeded. Mirrors `kmalloc` failing inside `mm_map_frag`.
    pub fn reserve_anchors(&mut self, additional: usize) -> Result<(), MapError> {
        let requested = self.anchors.len() + additional;
        if requested > MAX_ANCHORS_PER_QUERY {
            return Err(MapError::AllocFailure {
                requested,
                budget: MAX_ANCHORS_PER_QUERY,
            });
        }
        self.anchors.reserve(additional);
        Ok(())
    }

    /// Release all per-query scratch back to the arena. Called once at the
    /// end of `QueryPipeline::run`, regardless of whether the query mapped.
    pub fn reset(&mut self) {
        self.anchors.clear();
        self.chains.clear();
    }
}
