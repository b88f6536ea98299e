use bitflags::bitflags;

bitflags! {
    /// Behavioral switches from the original mapping-options flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OptFlags: u32 {
        /// Skip a hit at the same reference position as the query itself.
        const NO_SELF = 0b0000_0001;
        /// All-vs-all: map each pair once, skip single-best-mapping postproc.
        const AVA     = 0b0000_0010;
        /// Run the aligner to produce CIGAR strings.
        const CIGAR   = 0b0000_0100;
        /// Extend chain ends without a full CIGAR (z-drop extension only).
        const EXT_END = 0b0000_1000;
        /// Emit SAM instead of PAF.
        const OUT_SAM = 0b0001_0000;
        /// Omit base qualities even when available.
        const NO_QUAL = 0b0010_0000;
    }
}

impl Default for OptFlags {
    fn default() -> Self {
        OptFlags::empty()
    }
}

/// The single options record shared read-only across workers.
///
/// Builder-style record: public fields with `with_*` setters, cheap to
/// `Clone`.
#[derive(Debug, Clone)]
pub struct Options {
    // seed selection
    pub max_occ_frac: f64,
    pub mid_occ_frac: f64,
    pub sdust_thres: i32,
    /// Resolved occurrence ceilings; filled in by `Options::calibrate`
    /// against a concrete index (mirrors `mm_mapopt_update`).
    pub max_occ: u32,
    pub mid_occ: u32,

    // chaining
    pub min_cnt: u32,
    pub min_chain_score: f64,
    pub bw: i64,
    pub max_gap: i64,
    pub max_chain_skip: u32,

    // selection
    pub mask_level: f64,
    pub pri_ratio: f64,
    pub best_n: usize,

    // joining
    pub max_join_long: i64,
    pub max_join_short: i64,
    pub min_join_flank_sc: f64,

    // alignment gateway (passed through to the external aligner, not used by the core)
    pub a: i32,
    pub b: i32,
    pub q: i32,
    pub e: i32,
    pub q2: i32,
    pub e2: i32,
    pub zdrop: i32,
    pub min_dp_max: f64,
    pub min_ksw_len: i32,

    pub flags: OptFlags,

    // batch pipeline
    pub n_threads: usize,
    pub mini_batch_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_occ_frac: 1e-5,
            mid_occ_frac: 2e-4,
            sdust_thres: 0,
            max_occ: u32::MAX,
            mid_occ: u32::MAX,

            min_cnt: 3,
            min_chain_score: 40.0,
            bw: 500,
            max_gap: 5000,
            max_chain_skip: 25,

            mask_level: 0.5,
            pri_ratio: 0.8,
            best_n: 5,

            max_join_long: 20_000,
            max_join_short: 2_000,
            min_join_flank_sc: 1_000.0,

            a: 2,
            b: 4,
            q: 4,
            e: 2,
            q2: 24,
            e2: 1,
            zdrop: 400,
            min_dp_max: 40.0,
            min_ksw_len: 200,

            flags: OptFlags::empty(),
            n_threads: 1,
            mini_batch_size: 200,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(mut self, flags: OptFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads.max(1);
        self
    }

    pub fn with_mini_batch_size(mut self, n: usize) -> Self {
        self.mini_batch_size = n.max(1);
        self
    }

    pub fn with_min_chain_score(mut self, score: f64) -> Self {
        self.min_chain_score = score;
        self
    }

    /// Resolve `max_occ`/`mid_occ` against a concrete index's occurrence
    /// distribution (`mm_mapopt_update` in the original source). Called once
    /// per index, before the batch pipeline starts.
    pub fn calibrate(&mut self, calibrate_occurrence: impl Fn(f64) -> u32) {
        self.max_occ = calibrate_occurrence(self.max_occ_frac);
        self.mid_occ = calibrate_occurrence(self.mid_occ_frac);
        tracing::debug!(mid_occ = self.mid_occ, max_occ = self.max_occ, "calibrated occurrence thresholds");
    }
}
