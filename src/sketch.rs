//! Minimizer sketching: an external collaborator. The core only needs
//! the shape of a minimizer record, not how it is computed.

use crate::strand::Strand;

/// One `(w,k)`-minimizer of a query sequence.
///
/// `query_pos` is the 0-based *end* coordinate of the k-mer on the query
/// (forward-strand coordinates always; reverse-complement remapping for
/// reverse anchors happens in `AnchorBuilder`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Minimizer {
    pub hash: u64,
    pub span: u8,
    pub query_pos: u32,
    pub strand: Strand,
}

/// Computes the minimizer sequence of a query. Implementation (window
/// minimum selection, homopolymer-compressed k-mers) is out of scope; this
/// crate depends only on the contract.
pub trait Sketcher: Sync {
    /// Returns minimizers in ascending query-position order.
    fn sketch(&self, seq: &[u8], w: u8, k: u8, is_hpc: bool) -> Vec<Minimizer>;
}
