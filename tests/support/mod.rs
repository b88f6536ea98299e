//! In-memory test doubles for the external collaborator traits
//! (`Index`, `Sketcher`, `LowComplexityDetector`), used only by the
//! integration suite in `tests/scenarios.rs`. Real minimizer hashing
//! (not a fake/constant hash) so the seed → anchor → chain path is
//! exercised exactly as a real index/sketcher pair would drive it.

use std::collections::HashMap;

use readmap::{Hits, Index, IndexHit, Interval, LowComplexityDetector, Minimizer, Sketcher, Strand};

fn base_code(b: u8) -> Option<u64> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

fn complement_code(c: u64) -> u64 {
    3 - c
}

/// One `(hash, strand)` pair per k-mer position, `hash` canonical (the
/// smaller of the forward and reverse-complement 2-bit encodings) so a
/// query and its reverse complement hash identically at corresponding
/// positions, the way a real strand-aware minimizer hash does.
fn kmer_codes(seq: &[u8], k: usize) -> Vec<Option<(u64, Strand)>> {
    let n = seq.len();
    if n < k {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n - k + 1);
    'outer: for i in 0..=(n - k) {
        let mut fwd = 0u64;
        let mut rc = 0u64;
        for j in 0..k {
            let code = match base_code(seq[i + j]) {
                Some(c) => c,
                None => {
                    out.push(None);
                    continue 'outer;
                }
            };
            fwd = (fwd << 2) | code;
            rc |= complement_code(code) << (2 * j);
        }
        let (hash, strand) = if fwd <= rc {
            (fwd, Strand::Forward)
        } else {
            (rc, Strand::Reverse)
        };
        out.push(Some((hash, strand)));
    }
    out
}

/// One `(w,k)`-minimizer per window, deduplicated across overlapping
/// windows the way a real sliding-window minimum does. `pos` is the
/// 0-based end coordinate of the k-mer, matching `Minimizer::query_pos`.
fn minimizer_positions(seq: &[u8], w: u8, k: u8) -> Vec<(u64, u8, u32, Strand)> {
    let k = k as usize;
    let w = (w as usize).max(1);
    let codes = kmer_codes(seq, k);
    if codes.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut last_pos: Option<usize> = None;
    for win_start in 0..codes.len() {
        let win_end = (win_start + w).min(codes.len());
        if win_end <= win_start {
            continue;
        }
        let mut best: Option<(u64, Strand, usize)> = None;
        for (off, slot) in codes[win_start..win_end].iter().enumerate() {
            if let Some((hash, strand)) = slot {
                let pos = win_start + off;
                if best.map_or(true, |(bh, _, bp)| *hash < bh || (*hash == bh && pos < bp)) {
                    best = Some((*hash, *strand, pos));
                }
            }
        }
        if let Some((hash, strand, pos)) = best {
            if last_pos != Some(pos) {
                last_pos = Some(pos);
                out.push((hash, k as u8, (pos + k - 1) as u32, strand));
            }
        }
        if win_start + w >= codes.len() {
            break;
        }
    }
    out
}

pub struct TestSketcher;

impl Sketcher for TestSketcher {
    fn sketch(&self, seq: &[u8], w: u8, k: u8, _is_hpc: bool) -> Vec<Minimizer> {
        minimizer_positions(seq, w, k)
            .into_iter()
            .map(|(hash, span, query_pos, strand)| Minimizer { hash, span, query_pos, strand })
            .collect()
    }
}

/// A small in-memory index over a handful of named reference sequences,
/// built with the same minimizer scheme `TestSketcher` uses so query and
/// reference hashes agree exactly (no synthetic hash collisions).
pub struct TestIndex {
    names: Vec<String>,
    lens: Vec<u32>,
    by_hash: HashMap<u64, Vec<IndexHit>>,
    w: u8,
    k: u8,
}

impl TestIndex {
    pub fn build(refs: &[(&str, &[u8])], w: u8, k: u8) -> Self {
        let mut names = Vec::new();
        let mut lens = Vec::new();
        let mut by_hash: HashMap<u64, Vec<IndexHit>> = HashMap::new();

        for (ref_id, (name, seq)) in refs.iter().enumerate() {
            names.push((*name).to_string());
            lens.push(seq.len() as u32);
            for (hash, _span, pos, strand) in minimizer_positions(seq, w, k) {
                by_hash.entry(hash).or_default().push(IndexHit {
                    ref_id: ref_id as u32,
                    ref_pos: pos,
                    strand,
                });
            }
        }

        Self { names, lens, by_hash, w, k }
    }
}

impl Index for TestIndex {
    fn lookup(&self, hash: u64) -> (Hits<'_>, u32) {
        match self.by_hash.get(&hash) {
            Some(hits) => (Hits::Borrowed(hits), hits.len() as u32),
            None => (Hits::Owned(Vec::new()), 0),
        }
    }

    fn calibrate_occurrence(&self, _fraction: f64) -> u32 {
        u32::MAX
    }

    fn ref_name(&self, ref_id: u32) -> &str {
        &self.names[ref_id as usize]
    }

    fn ref_len(&self, ref_id: u32) -> u32 {
        self.lens[ref_id as usize]
    }

    fn n_refs(&self) -> u32 {
        self.names.len() as u32
    }

    fn w(&self) -> u8 {
        self.w
    }

    fn k(&self) -> u8 {
        self.k
    }

    fn is_hpc(&self) -> bool {
        false
    }
}

pub struct NoMask;

impl LowComplexityDetector for NoMask {
    fn mask(&self, _seq: &[u8], _threshold: i32) -> Vec<Interval> {
        Vec::new()
    }
}

/// A detector that masks maximal homopolymer runs at least `min_run`
/// bases long, standing in for `sdust` in the one scenario (S5) that
/// needs low-complexity masking to do something observable.
pub struct HomopolymerDetector {
    pub min_run: usize,
}

impl LowComplexityDetector for HomopolymerDetector {
    fn mask(&self, seq: &[u8], _threshold: i32) -> Vec<Interval> {
        let mut out = Vec::new();
        let mut i = 0usize;
        while i < seq.len() {
            let mut j = i + 1;
            while j < seq.len() && seq[j] == seq[i] {
                j += 1;
            }
            if j - i >= self.min_run {
                out.push(Interval { start: i as u32, end: j as u32 });
            }
            i = j;
        }
        out
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => other,
        })
        .collect()
}
