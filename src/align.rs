//! Base-level alignment: an external collaborator. Only the handoff
//! (chain in, `MappingRecord` with CIGAR out) is specified; the DP
//! algorithm itself is out of scope.

use noodles_sam::alignment::record_buf::Cigar;

use crate::anchor::Anchor;
use crate::chain::Chain;
use crate::index::Index;
use crate::strand::Strand;

/// The user-visible result per query.
#[derive(Debug, Clone)]
pub struct MappingRecord {
    pub ref_id: u32,
    pub ref_start: u32,
    pub ref_end: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub strand: Strand,
    pub score: f64,
    pub n_anchors: u32,
    /// Index into the query's chain array; equal to this record's own
    /// index when the mapping is primary.
    pub parent: usize,
    pub mapq: u8,
    /// True for a mapping whose query interval is contained within its
    /// parent's (a secondary overlap), false for the primary itself or an
    /// independently-joined region.
    pub subset: bool,
    pub cigar: Option<Cigar>,
    pub edit_distance: Option<u32>,
}

impl MappingRecord {
    pub fn from_chain(idx: usize, chain: &Chain) -> Self {
        MappingRecord {
            ref_id: chain.ref_id,
            ref_start: chain.r_start,
            ref_end: chain.r_end,
            query_start: chain.q_start,
            query_end: chain.q_end,
            strand: chain.strand,
            score: chain.score,
            n_anchors: chain.len as u32,
            parent: if chain.parent == idx { idx } else { chain.parent },
            mapq: chain.mapq,
            subset: !chain.primary,
            cigar: None,
            edit_distance: None,
        }
    }
}

/// Consumes chains and produces base-level alignments. May reject a chain
/// (empty `Vec`) or split it into several records (e.g. across a large
/// intron). Implementation is out of scope.
pub trait Aligner: Sync {
    fn align_chain<I: Index>(
        &self,
        chain: &Chain,
        chain_anchors: &[Anchor],
        query: &[u8],
        index: &I,
    ) -> Vec<MappingRecord>;
}

/// No-op aligner used when neither `CIGAR` nor `EXT_END` is set: chains
/// pass straight through as records without base-level extension.
pub struct NoAligner;

impl Aligner for NoAligner {
    fn align_chain<I: Index>(
        &self,
        _chain: &Chain,
        _chain_anchors: &[Anchor],
        _query: &[u8],
        _index: &I,
    ) -> Vec<MappingRecord> {
        Vec::new()
    }
}
