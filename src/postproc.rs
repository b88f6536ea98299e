//! Chain post-processing: parent assignment, primary/secondary
//! selection, long-chain joining, and mapping-quality assignment.

use std::collections::HashMap;

use crate::anchor::Anchor;
use crate::chain::Chain;
use crate::lowcomplexity::Interval;

#[derive(Debug, Clone)]
pub struct PostprocParams {
    pub mask_level: f64,
    pub pri_ratio: f64,
    pub best_n: usize,
    pub max_join_long: i64,
    pub max_join_short: i64,
    pub min_join_flank_sc: f64,
}

pub struct ChainPostproc {
    pub params: PostprocParams,
}

pub(crate) fn interval_overlap(a: (u32, u32), b: (u32, u32)) -> u32 {
    let s = a.0.max(b.0);
    let e = a.1.min(b.1);
    e.saturating_sub(s)
}

impl ChainPostproc {
    pub fn new(params: PostprocParams) -> Self {
        Self { params }
    }

    /// `chains` must be sorted by descending score (the order
    /// `Chainer::chain` leaves them in). A chain becomes the child of the
    /// first already-established primary whose query interval it overlaps
    /// by more than `mask_level` of the shorter interval; otherwise it
    /// becomes its own parent.
    pub fn assign_parents(&self, chains: &mut [Chain]) {
        for i in 0..chains.len() {
            let qi = (chains[i].q_start, chains[i].q_end);
            let mut parent = i;
            for j in 0..i {
                if chains[j].parent != j {
                    continue; // only compare against established primaries
                }
                let qj = (chains[j].q_start, chains[j].q_end);
                let shorter = (qi.1 - qi.0).min(qj.1 - qj.0);
                if shorter == 0 {
                    continue;
                }
                let overlap = interval_overlap(qi, qj);
                if overlap as f64 > self.params.mask_level * shorter as f64 {
                    parent = j;
                    break;
                }
            }
            chains[i].parent = parent;
        }
    }

    /// Keeps the top `best_n` chains per parent family whose score
    /// is `>= pri_ratio * parent_score`, drops the rest, and marks the
    /// highest scorer in each surviving family primary.
    pub fn select_primary_secondary(&self, chains: Vec<Chain>) -> Vec<Chain> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, c) in chains.iter().enumerate() {
            groups.entry(c.parent).or_default().push(i);
        }

        let mut keep = vec![false; chains.len()];
        for (&root, members) in &groups {
            let root_score = chains[root].score;
            let mut members = members.clone();
            members.sort_unstable_by(|&a, &b| chains[b].score.partial_cmp(&chains[a].score).unwrap());
            for (rank, &idx) in members.iter().enumerate() {
                if rank < self.params.best_n && chains[idx].score >= self.params.pri_ratio * root_score {
                    keep[idx] = true;
                }
            }
        }

        let mut old_to_new = vec![usize::MAX; chains.len()];
        let mut result = Vec::new();
        for (i, c) in chains.into_iter().enumerate() {
            if keep[i] {
                old_to_new[i] = result.len();
                result.push(c);
            }
        }
        for c in result.iter_mut() {
            c.parent = old_to_new[c.parent];
        }
        // A chain is its own parent iff it is primary (root of its family).
        for i in 0..result.len() {
            result[i].primary = result[i].parent == i;
        }
        result
    }

    /// Merges a tail chain into a parent chain when both are on the
    /// same strand/ref_id, the intervening gap is small, and the query/ref
    /// order is monotonic. Transitive: a chain may absorb several
    /// successive tails; children of an absorbed chain are re-parented to
    /// the surviving chain.
    ///
    /// A merged chain's anchors are not contiguous in `anchors` (its two
    /// halves were chained and ordered independently), so this rebuilds a
    /// fresh anchor buffer with each surviving chain's anchors concatenated
    /// into one contiguous run and returns it alongside the joined chains.
    /// Callers must install the returned buffer wherever `anchors` came
    /// from before indexing any chain's `start..start+len` again.
    pub fn join_long(&self, chains: Vec<Chain>, anchors: &[Anchor]) -> (Vec<Chain>, Vec<Anchor>) {
        let mut chains = chains;
        let mut parts: Vec<Vec<(usize, usize)>> =
            chains.iter().map(|c| vec![(c.start, c.len)]).collect();

        let mut primaries: Vec<usize> = chains
            .iter()
            .enumerate()
            .filter(|(i, c)| c.parent == *i)
            .map(|(i, _)| i)
            .collect();
        primaries.sort_unstable_by_key(|&i| {
            (chains[i].strand.is_reverse(), chains[i].ref_id, chains[i].q_start)
        });

        let mut removed = vec![false; chains.len()];
        let mut i = 0;
        while i + 1 < primaries.len() {
            let a = primaries[i];
            let b = primaries[i + 1];
            if chains[a].strand != chains[b].strand || chains[a].ref_id != chains[b].ref_id {
                i += 1;
                continue;
            }
            let qgap = chains[b].q_start as i64 - chains[a].q_end as i64;
            let rgap = chains[b].r_start as i64 - chains[a].r_end as i64;
            let monotonic = qgap >= 0 && rgap >= 0;
            let short_ok = qgap <= self.params.max_join_short && rgap <= self.params.max_join_short;
            let long_ok = qgap <= self.params.max_join_long
                && rgap <= self.params.max_join_long
                && chains[a].score > self.params.min_join_flank_sc
                && chains[b].score > self.params.min_join_flank_sc;

            if monotonic && (short_ok || long_ok) {
                chains[a].q_end = chains[b].q_end;
                chains[a].r_end = chains[b].r_end;
                chains[a].score += chains[b].score;
                chains[a].len += chains[b].len;
                let b_parts = std::mem::take(&mut parts[b]);
                parts[a].extend(b_parts);
                for c in chains.iter_mut() {
                    if c.parent == b {
                        c.parent = a;
                    }
                }
                removed[b] = true;
                primaries.remove(i + 1);
                continue; // retry `a` against its new neighbor
            }
            i += 1;
        }

        let mut old_to_new = vec![usize::MAX; chains.len()];
        let mut result = Vec::new();
        let mut new_anchors = Vec::with_capacity(anchors.len());
        for (idx, mut c) in chains.into_iter().enumerate() {
            if removed[idx] {
                continue;
            }
            let new_start = new_anchors.len();
            for &(start, len) in &parts[idx] {
                new_anchors.extend_from_slice(&anchors[start..start + len]);
            }
            c.start = new_start;
            c.len = new_anchors.len() - new_start;
            old_to_new[idx] = result.len();
            result.push(c);
        }
        for c in result.iter_mut() {
            c.parent = old_to_new[c.parent];
        }
        (result, new_anchors)
    }

    /// Assigns `[0, 60]` mapping quality to each primary chain,
    /// decreasing with the best competing secondary's score ratio, the
    /// number of competing secondaries, and the fraction of the chain's
    /// query span that is unchained or low-complexity. Secondary chains
    /// are always assigned mapq 0, per SAM convention.
    pub fn assign_mapq(&self, chains: &mut [Chain], anchors: &[Anchor], masked: &[Interval]) {
        let mut by_parent: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, c) in chains.iter().enumerate() {
            by_parent.entry(c.parent).or_default().push(i);
        }

        for (&root, members) in &by_parent {
            let primary_score = chains[root].score;
            let mut best_secondary: Option<f64> = None;
            let mut n_secondary = 0usize;
            for &idx in members {
                if idx == root {
                    continue;
                }
                n_secondary += 1;
                best_secondary = Some(best_secondary.map_or(chains[idx].score, |b| b.max(chains[idx].score)));
            }

            let chain_span = chains[root].q_end - chains[root].q_start;
            let root_anchors = &anchors[chains[root].start..chains[root].start + chains[root].len];
            let covered: u32 = root_anchors.iter().map(|a| a.span).sum();
            let unchained_frac = if chain_span == 0 {
                0.0
            } else {
                1.0 - (covered as f64 / chain_span as f64).min(1.0)
            };

            let masked_overlap: u32 = masked
                .iter()
                .map(|m| interval_overlap((m.start, m.end), (chains[root].q_start, chains[root].q_end)))
                .sum();
            let masked_frac = if chain_span == 0 {
                0.0
            } else {
                masked_overlap as f64 / chain_span as f64
            };

            let combined_frac = (unchained_frac + masked_frac).min(1.0);
            let mapq = compute_mapq(primary_score, best_secondary, n_secondary, combined_frac);
            tracing::trace!(primary_score, n_secondary, mapq, "assigned mapq");

            chains[root].mapq = mapq;
            for &idx in members {
                if idx != root {
                    chains[idx].mapq = 0;
                }
            }
        }
    }
}

/// Monotone (decreasing) in `sub_ratio`, `n_secondary`, and
/// `low_complexity_or_unchained_frac`.
fn compute_mapq(
    primary_score: f64,
    best_secondary: Option<f64>,
    n_secondary: usize,
    low_complexity_or_unchained_frac: f64,
) -> u8 {
    if primary_score <= 0.0 {
        return 0;
    }
    let sub_ratio = best_secondary
        .map(|s| (s / primary_score).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let ratio_term = (1.0 - sub_ratio).powi(2);
    let competitor_term = 1.0 / (1.0 + n_secondary as f64 * 0.2);
    let coverage_term = 1.0 - low_complexity_or_unchained_frac.clamp(0.0, 1.0);

    (60.0 * ratio_term * competitor_term * coverage_term)
        .round()
        .clamp(0.0, 60.0) as u8
}
