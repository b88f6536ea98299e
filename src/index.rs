//! The prebuilt minimizer index: an external collaborator. Index
//! construction is explicitly a non-goal; this module is only the contract
//! the core maps against, plus the small value types it returns.

use crate::strand::Strand;

/// One occurrence of a minimizer hash in the reference collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHit {
    pub ref_id: u32,
    pub ref_pos: u32,
    pub strand: Strand,
}

/// Result of `Index::lookup`.
///
/// Most indexes hand back a slice into their own storage (`Borrowed`); an
/// index backed by compressed or on-the-fly-decoded storage may need to
/// materialize a copy instead (`Owned`). The seed/anchor stages never care
/// which: they only ever read through `as_slice`.
pub enum Hits<'a> {
    Borrowed(&'a [IndexHit]),
    Owned(Vec<IndexHit>),
}

impl<'a> Hits<'a> {
    pub fn as_slice(&self) -> &[IndexHit] {
        match self {
            Hits::Borrowed(s) => s,
            Hits::Owned(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Read-only, shared-by-reference across all workers. Implementations
/// must support concurrent `lookup` without locking.
pub trait Index: Sync {
    /// Returns the (possibly filtered) occurrence slice for `hash`, along
    /// with the *total* occurrence count — reported even when the slice
    /// itself is filtered or truncated.
    fn lookup(&self, hash: u64) -> (Hits<'_>, u32);

    /// Occurrence-count cutoff at the given distribution quantile
    /// (`mm_idx_cal_max_occ` in the original source).
    fn calibrate_occurrence(&self, fraction: f64) -> u32;

    fn ref_name(&self, ref_id: u32) -> &str;
    fn ref_len(&self, ref_id: u32) -> u32;
    fn n_refs(&self) -> u32;

    fn w(&self) -> u8;
    fn k(&self) -> u8;
    fn is_hpc(&self) -> bool;
}
