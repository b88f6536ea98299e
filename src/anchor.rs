//! Anchor construction: expands minimizer hits into strand-oriented
//! anchors, skipping over-frequent minimizers and self/AVA diagonal hits.

use crate::arena::ScratchArena;
use crate::error::MapError;
use crate::index::Index;
use crate::options::{OptFlags, Options};
use crate::sketch::Minimizer;
use crate::strand::Strand;

/// A seed match located simultaneously in query and reference coordinate
/// space, oriented by relative strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub rev: bool,
    pub ref_id: u32,
    pub ref_pos: u32,
    pub span: u32,
    /// Query coordinate: forward query-end position on forward anchors,
    /// reverse-complement query-end position on reverse anchors.
    pub qpos: u32,
}

impl Anchor {
    /// Sort key grouping anchors by `(rev, ref_id)` and ordering by
    /// `ref_pos`.
    fn sort_key(&self) -> (bool, u32, u32) {
        (self.rev, self.ref_id, self.ref_pos)
    }
}

pub struct AnchorBuilder<'a> {
    pub options: &'a Options,
}

impl<'a> AnchorBuilder<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    /// Builds the anchor array for `minimizers[m_st..m_en]` into
    /// `arena.anchors` (assumed already empty for this query) and sorts it.
    pub fn build(
        &self,
        index: &impl Index,
        minimizers: &[Minimizer],
        qname: Option<&str>,
        qlen: u32,
        arena: &mut ScratchArena,
    ) -> Result<(), MapError> {
        let flags = self.options.flags;
        arena.reserve_anchors(minimizers.len())?;

        for m in minimizers {
            let (hits, n) = index.lookup(m.hash);
            if n >= self.options.mid_occ {
                continue; // too repetitive to be informative
            }
            let qpos_fwd = m.query_pos;
            let span = m.span as u32;

            for hit in hits.as_slice() {
                let target_name = index.ref_name(hit.ref_id);

                if flags.contains(OptFlags::NO_SELF) {
                    if let Some(qn) = qname {
                        if qn == target_name && hit.ref_pos == qpos_fwd {
                            continue; // avoid the diagonal
                        }
                    }
                }
                if flags.contains(OptFlags::AVA) {
                    if let Some(qn) = qname {
                        if qn >= target_name {
                            continue; // all-vs-all: map each pair once, qn < target_name only
                        }
                    }
                }

                let forward = hit.strand == m.strand;
                let anchor = if forward {
                    Anchor {
                        rev: false,
                        ref_id: hit.ref_id,
                        ref_pos: hit.ref_pos,
                        span,
                        qpos: qpos_fwd,
                    }
                } else {
                    Anchor {
                        rev: true,
                        ref_id: hit.ref_id,
                        ref_pos: hit.ref_pos,
                        span,
                        qpos: qlen - (qpos_fwd + 1 - span) - 1,
                    }
                };
                arena.anchors.push(anchor);
            }
        }

        arena.anchors.sort_unstable_by_key(Anchor::sort_key);
        Ok(())
    }
}
