//! Per-query pipeline: sketch, low-complexity filter, anchor build,
//! chain, post-process, and (optionally) align a single query against an
//! index. Generic over the four external collaborator traits so the whole
//! pipeline monomorphizes per concrete `Index`/`Sketcher`/
//! `LowComplexityDetector`/`Aligner` set, with no dynamic dispatch on the
//! hot path.

use crate::align::{Aligner, MappingRecord};
use crate::anchor::AnchorBuilder;
use crate::arena::ScratchArena;
use crate::chain::{ChainParams, Chainer};
use crate::error::MapError;
use crate::index::Index;
use crate::lowcomplexity::{filter_low_complexity, LowComplexityDetector};
use crate::options::{OptFlags, Options};
use crate::postproc::{ChainPostproc, PostprocParams};
use crate::sketch::Sketcher;

pub struct QueryPipeline<'a, S, L, A> {
    pub options: &'a Options,
    pub sketcher: &'a S,
    pub lc_detector: Option<&'a L>,
    pub aligner: &'a A,
}

impl<'a, S, L, A> QueryPipeline<'a, S, L, A>
where
    S: Sketcher,
    L: LowComplexityDetector,
    A: Aligner,
{
    pub fn new(options: &'a Options, sketcher: &'a S, lc_detector: Option<&'a L>, aligner: &'a A) -> Self {
        Self { options, sketcher, lc_detector, aligner }
    }

    /// Maps one query against `index`, returning its mapping records in no
    /// particular order (ordering by query is `BatchPipeline`'s job). `arena`
    /// is reset at both entry and exit so a worker can reuse it unconditionally
    /// between queries, including after an early `Err` return.
    pub fn run<I: Index>(
        &self,
        index: &I,
        qname: Option<&str>,
        seq: &[u8],
        arena: &mut ScratchArena,
    ) -> Result<Vec<MappingRecord>, MapError> {
        arena.reset();
        let qlen = seq.len() as u32;

        let mut minimizers = self.sketcher.sketch(seq, index.w(), index.k(), index.is_hpc());

        let masked = if self.options.sdust_thres > 0 {
            self.lc_detector
                .map(|d| d.mask(seq, self.options.sdust_thres))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        filter_low_complexity(&mut minimizers, &masked);

        AnchorBuilder::new(self.options).build(index, &minimizers, qname, qlen, arena)?;

        let chainer = Chainer::new(ChainParams {
            max_gap: self.options.max_gap,
            bw: self.options.bw,
            max_chain_skip: self.options.max_chain_skip,
            min_cnt: self.options.min_cnt,
            min_chain_score: self.options.min_chain_score,
        });
        chainer.chain(arena);

        let postproc = ChainPostproc::new(PostprocParams {
            mask_level: self.options.mask_level,
            pri_ratio: self.options.pri_ratio,
            best_n: self.options.best_n,
            max_join_long: self.options.max_join_long,
            max_join_short: self.options.max_join_short,
            min_join_flank_sc: self.options.min_join_flank_sc,
        });

        let is_ava = self.options.flags.contains(OptFlags::AVA);
        let mut chains = std::mem::take(&mut arena.chains);

        if is_ava {
            // AVA reports every chain as its own overlap: no single-best
            // selection, no joining.
            for (i, c) in chains.iter_mut().enumerate() {
                c.parent = i;
                c.primary = true;
            }
        } else {
            postproc.assign_parents(&mut chains);
            chains = postproc.select_primary_secondary(chains);
            let (joined_chains, joined_anchors) = postproc.join_long(chains, &arena.anchors);
            chains = joined_chains;
            arena.anchors = joined_anchors;
            postproc.assign_mapq(&mut chains, &arena.anchors, &masked);
        }

        let records = if self.options.flags.intersects(OptFlags::CIGAR | OptFlags::EXT_END) {
            self.align_and_rerank(&chains, &postproc, is_ava, seq, index, &*arena, &masked)
        } else {
            chains.iter().enumerate().map(|(i, c)| MappingRecord::from_chain(i, c)).collect()
        };

        tracing::debug!(qname, n_chains = arena.chains.len(), n_records = records.len(), "query mapped");

        arena.chains = chains;
        arena.reset();
        Ok(records)
    }

    /// Runs the aligner over each selected chain and repeats the
    /// parent/secondary pass, since base-level extension can change chain
    /// scores enough to reorder primary/secondary status. A chain the
    /// aligner rejects (empty result) drops out entirely, as if it had never
    /// been chained. `EXT_END` alone never rejects a chain — there is no
    /// separate CIGAR to fail producing — so the unextended chain passes
    /// through unchanged.
    fn align_and_rerank<I: Index>(
        &self,
        chains: &[crate::chain::Chain],
        postproc: &ChainPostproc,
        is_ava: bool,
        seq: &[u8],
        index: &I,
        arena: &ScratchArena,
        masked: &[crate::lowcomplexity::Interval],
    ) -> Vec<MappingRecord> {
        let mut survivors: Vec<(crate::chain::Chain, MappingRecord)> = Vec::with_capacity(chains.len());
        for (i, &chain) in chains.iter().enumerate() {
            let chain_anchors = &arena.anchors[chain.start..chain.start + chain.len];
            let aligned = self.aligner.align_chain(&chain, chain_anchors, seq, index);
            match aligned.into_iter().next() {
                Some(rec) => {
                    let mut updated = chain;
                    updated.score = rec.score;
                    survivors.push((updated, rec));
                }
                None if !self.options.flags.contains(OptFlags::CIGAR) => {
                    let rec = MappingRecord::from_chain(i, &chain);
                    survivors.push((chain, rec));
                }
                None => {} // aligner rejected this chain outright
            }
        }

        if is_ava || survivors.is_empty() {
            return survivors
                .into_iter()
                .enumerate()
                .map(|(i, (_, mut rec))| {
                    rec.parent = i;
                    rec.subset = false;
                    rec
                })
                .collect();
        }

        let mut rerank_chains: Vec<crate::chain::Chain> = survivors.iter().map(|(c, _)| *c).collect();
        postproc.assign_parents(&mut rerank_chains);
        let keep = rerank_keep(&rerank_chains, postproc);
        postproc.assign_mapq(&mut rerank_chains, &arena.anchors, masked);

        survivors
            .into_iter()
            .zip(rerank_chains.into_iter())
            .enumerate()
            .filter(|(i, _)| keep[*i])
            .map(|(i, ((_, mut rec), reranked))| {
                rec.parent = reranked.parent;
                rec.mapq = reranked.mapq;
                rec.subset = reranked.parent != i;
                rec
            })
            .collect()
    }
}

/// `select_primary_secondary` takes ownership and reindexes the whole
/// `Vec<Chain>`; here we need to keep a parallel `MappingRecord` vector in
/// lockstep, so this re-derives the same rank/ratio keep decision against
/// the already-parent-assigned `chains` without reordering or dropping
/// anything itself.
fn rerank_keep(chains: &[crate::chain::Chain], postproc: &ChainPostproc) -> Vec<bool> {
    use std::collections::HashMap;
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
            if rank < postproc.params.best_n && chains[idx].score >= postproc.params.pri_ratio * root_score {
                keep[idx] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::NoAligner;
    use crate::index::{Hits, IndexHit};
    use crate::sketch::Minimizer;
    use crate::strand::Strand;

    struct EchoSketcher;
    impl Sketcher for EchoSketcher {
        fn sketch(&self, seq: &[u8], w: u8, k: u8, _is_hpc: bool) -> Vec<Minimizer> {
            // one minimizer every `k` bases, matching a real (w=1) sketcher's density.
            let k = k as usize;
            let w = w.max(1) as usize;
            let _ = w;
            (0..seq.len())
                .step_by(k)
                .filter(|&p| p + k <= seq.len())
                .map(|p| Minimizer {
                    hash: p as u64, // distinct hash per position: no spurious repeats
                    span: k as u8,
                    query_pos: (p + k - 1) as u32,
                    strand: Strand::Forward,
                })
                .collect()
        }
    }

    struct NoMask;
    impl LowComplexityDetector for NoMask {
        fn mask(&self, _seq: &[u8], _threshold: i32) -> Vec<crate::lowcomplexity::Interval> {
            Vec::new()
        }
    }

    /// An index whose only reference is the query's own forward sequence,
    /// mimicking a perfect self-match (S1-style exact-match scenario).
    struct SelfMatchIndex {
        k: u8,
        n: u32,
    }
    impl Index for SelfMatchIndex {
        fn lookup(&self, hash: u64) -> (Hits<'_>, u32) {
            if hash < self.n as u64 {
                let hit = IndexHit { ref_id: 0, ref_pos: hash as u32, strand: Strand::Forward };
                (Hits::Owned(vec![hit]), 1)
            } else {
                (Hits::Owned(Vec::new()), 0)
            }
        }
        fn calibrate_occurrence(&self, _fraction: f64) -> u32 {
            u32::MAX
        }
        fn ref_name(&self, _ref_id: u32) -> &str {
            "ref"
        }
        fn ref_len(&self, _ref_id: u32) -> u32 {
            1000
        }
        fn n_refs(&self) -> u32 {
            1
        }
        fn w(&self) -> u8 {
            1
        }
        fn k(&self) -> u8 {
            self.k
        }
        fn is_hpc(&self) -> bool {
            false
        }
    }

    #[test]
    fn exact_self_match_produces_one_high_confidence_primary() {
        let seq = b"ACGTACGTACGTACGTACGT"; // 20bp
        let index = SelfMatchIndex { k: 5, n: seq.len() as u32 };
        let opts = Options::new().with_min_chain_score(1.0);
        let mut opts = opts;
        opts.min_cnt = 1;

        let sketcher = EchoSketcher;
        let mask = NoMask;
        let aligner = NoAligner;
        let pipeline = QueryPipeline::new(&opts, &sketcher, Some(&mask), &aligner);

        let mut arena = ScratchArena::new();
        let records = pipeline.run(&index, Some("query"), seq, &mut arena).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mapq, 60);
        assert!(!records[0].subset);
    }

    #[test]
    fn ava_mode_skips_single_best_selection() {
        let seq = b"ACGTACGTACGTACGTACGT";
        let index = SelfMatchIndex { k: 5, n: seq.len() as u32 };
        let mut opts = Options::new().with_min_chain_score(1.0);
        opts.min_cnt = 1;
        opts.flags = OptFlags::AVA;

        let sketcher = EchoSketcher;
        let mask = NoMask;
        let aligner = NoAligner;
        let pipeline = QueryPipeline::new(&opts, &sketcher, Some(&mask), &aligner);

        let mut arena = ScratchArena::new();
        let records = pipeline.run(&index, Some("other_query"), seq, &mut arena).unwrap();

        assert!(records.iter().all(|r| !r.subset));
    }

    #[test]
    fn no_seeds_yields_empty_mappings() {
        struct EmptyIndex;
        impl Index for EmptyIndex {
            fn lookup(&self, _hash: u64) -> (Hits<'_>, u32) {
                (Hits::Owned(Vec::new()), 0)
            }
            fn calibrate_occurrence(&self, _fraction: f64) -> u32 {
                u32::MAX
            }
            fn ref_name(&self, _ref_id: u32) -> &str {
                "ref"
            }
            fn ref_len(&self, _ref_id: u32) -> u32 {
                1000
            }
            fn n_refs(&self) -> u32 {
                1
            }
            fn w(&self) -> u8 {
                1
            }
            fn k(&self) -> u8 {
                5
            }
            fn is_hpc(&self) -> bool {
                false
            }
        }

        let seq = b"ACGTACGTACGTACGTACGT";
        let opts = Options::new();
        let sketcher = EchoSketcher;
        let mask = NoMask;
        let aligner = NoAligner;
        let pipeline = QueryPipeline::new(&opts, &sketcher, Some(&mask), &aligner);

        let mut arena = ScratchArena::new();
        let records = pipeline.run(&EmptyIndex, Some("query"), seq, &mut arena).unwrap();
        assert!(records.is_empty());
    }
}
