//! Sparse colinear DP chaining: selects colinear anchor subsequences
//! maximizing a chain score under a gap-cost model with bounded lookback,
//! `O(n · max_skip)` per strand/ref group.

use crate::anchor::Anchor;
use crate::arena::ScratchArena;
use crate::strand::Strand;

/// A colinear, gap-bounded sequence of anchors sharing strand and
/// reference id. `start`/`len` index into the arena's anchor buffer
/// *after* chaining has permuted it into per-chain-contiguous order.
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub start: usize,
    pub len: usize,
    pub score: f64,
    pub strand: Strand,
    pub ref_id: u32,
    pub q_start: u32,
    pub q_end: u32,
    pub r_start: u32,
    pub r_end: u32,
    /// Index into the chain array; equal to this chain's own index until
    /// `ChainPostproc` assigns real parentage.
    pub parent: usize,
    pub primary: bool,
    pub mapq: u8,
}

#[derive(Debug, Clone)]
pub struct ChainParams {
    pub max_gap: i64,
    pub bw: i64,
    pub max_chain_skip: u32,
    pub min_cnt: u32,
    pub min_chain_score: f64,
}

pub struct Chainer {
    pub params: ChainParams,
}

impl Chainer {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    /// Runs chaining over `arena.anchors` (must already be sorted by
    /// `(rev, ref_id, ref_pos)`, as `AnchorBuilder::build` leaves it).
    /// Replaces the anchor buffer with a per-chain-contiguous reordering
    /// and fills `arena.chains` with the accepted chains, sorted by
    /// descending score.
    pub fn chain(&self, arena: &mut ScratchArena) {
        let anchors = std::mem::take(&mut arena.anchors);
        let n = anchors.len();
        arena.chains.clear();
        if n == 0 {
            arena.anchors = anchors;
            return;
        }

        let avg_span = anchors.iter().map(|a| a.span as f64).sum::<f64>() / n as f64;

        let mut f = vec![0.0f64; n];
        let mut p = vec![-1i64; n];

        let mut group_start = 0usize;
        while group_start < n {
            let key = (anchors[group_start].rev, anchors[group_start].ref_id);
            let mut group_end = group_start + 1;
            while group_end < n && (anchors[group_end].rev, anchors[group_end].ref_id) == key {
                group_end += 1;
            }
            self.chain_group(&anchors, group_start, group_end, avg_span, &mut f, &mut p);
            group_start = group_end;
        }

        // Recover chains by descending tail score, marking anchors used.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_unstable_by(|&a, &b| f[b].partial_cmp(&f[a]).unwrap());

        let mut visited = vec![false; n];
        let mut raw_chains: Vec<(f64, Vec<usize>)> = Vec::new();

        for &tail in &order {
            if visited[tail] {
                continue;
            }
            let mut path = Vec::new();
            let mut cur = tail as i64;
            while cur >= 0 && !visited[cur as usize] {
                visited[cur as usize] = true;
                path.push(cur as usize);
                cur = p[cur as usize];
            }
            path.reverse();
            raw_chains.push((f[tail], path));
        }

        raw_chains.retain(|(score, path)| {
            path.len() as u32 >= self.params.min_cnt && *score >= self.params.min_chain_score
        });
        raw_chains.sort_unstable_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let mut reordered = Vec::with_capacity(n);
        for (score, path) in &raw_chains {
            let start = reordered.len();
            let mut q_start = u32::MAX;
            let mut q_end = 0u32;
            let mut r_start = u32::MAX;
            let mut r_end = 0u32;
            for &idx in path {
                let a = anchors[idx];
                let (qs, qe) = kmer_span(a.qpos, a.span);
                let (rs, re) = kmer_span(a.ref_pos, a.span);
                q_start = q_start.min(qs);
                q_end = q_end.max(qe);
                r_start = r_start.min(rs);
                r_end = r_end.max(re);
                reordered.push(a);
            }
            let first = anchors[path[0]];
            let idx = arena.chains.len();
            arena.chains.push(Chain {
                start,
                len: path.len(),
                score: *score,
                strand: if first.rev { Strand::Reverse } else { Strand::Forward },
                ref_id: first.ref_id,
                q_start,
                q_end,
                r_start,
                r_end,
                parent: idx,
                primary: true,
                mapq: 0,
            });
        }

        arena.anchors = reordered;
    }

    fn chain_group(
        &self,
        anchors: &[Anchor],
        start: usize,
        end: usize,
        avg_span: f64,
        f: &mut [f64],
        p: &mut [i64],
    ) {
        for i in start..end {
            let ai = anchors[i];
            let mut best_f = ai.span as f64;
            let mut best_j: i64 = -1;
            let mut skipped = 0u32;

            for j in (start..i).rev() {
                let aj = anchors[j];
                let dr = ai.ref_pos as i64 - aj.ref_pos as i64;
                if dr <= 0 {
                    continue;
                }
                if dr > self.params.max_gap {
                    // ref_pos is sorted ascending within the group, so every
                    // earlier j only makes dr larger: nothing further back helps.
                    break;
                }
                let dq = ai.qpos as i64 - aj.qpos as i64;
                if dq <= 0 || dq > self.params.max_gap {
                    continue;
                }
                let gap = (dr - dq).abs();
                if gap > self.params.bw {
                    continue;
                }
                let gap_penalty = if gap == 0 {
                    0.0
                } else {
                    0.01 * avg_span * gap as f64 + 0.5 * (gap as f64).log2()
                };
                let match_reward = dq.min(dr).min(ai.span as i64) as f64 - gap_penalty;
                let candidate = f[j] + match_reward;

                if candidate > best_f {
                    best_f = candidate;
                    best_j = j as i64;
                    skipped = 0;
                } else {
                    skipped += 1;
                    if skipped > self.params.max_chain_skip {
                        break;
                    }
                }
            }
            f[i] = best_f;
            p[i] = best_j;
        }
    }
}

/// `pos` is the 0-based coordinate of the k-mer's last base; returns the
/// half-open `[start, end)` span the k-mer covers.
fn kmer_span(pos: u32, span: u32) -> (u32, u32) {
    let end = pos as i64 + 1;
    let start = (end - span as i64).max(0);
    (start as u32, end as u32)
}
