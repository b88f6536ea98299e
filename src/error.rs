use thiserror::Error;

/// Design-level error kinds for the mapping core.
///
/// `NoMappings` is deliberately absent: it is a normal per-query outcome,
/// represented by an empty `Vec<MappingRecord>` rather than an error.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to open input stream: {0}")]
    InputOpen(String),

    #[error("query parameters (k={q_k}, w={q_w}, hpc={q_hpc}) do not match index (k={i_k}, w={i_w}, hpc={i_hpc})")]
    IndexMismatch {
        q_k: u8,
        q_w: u8,
        q_hpc: bool,
        i_k: u8,
        i_w: u8,
        i_hpc: bool,
    },

    #[error("reader produced an empty batch")]
    EmptyBatch,

    #[error("scratch arena exhausted (requested {requested} bytes, budget {budget} bytes)")]
    AllocFailure { requested: usize, budget: usize },
}
