//! Three-stage batch pipeline: read, map, write, each stage handed
//! off through a single-slot channel so at most one mini-batch is in flight
//! between any two stages. Stage 1 (map) fans a mini-batch out across a
//! `rayon::ThreadPool` sized to `Options::n_threads`, one `ScratchArena` per
//! worker, and reassembles results in input order before handing the batch
//! to Stage 2 (write). `n_threads <= 1` skips the pool and the stage threads
//! entirely and runs read/map/write as one sequential loop.
//!
//! A scoped worker pool handed one shared, read-only index, generalized
//! from a fixed two-phase align call into a three-stage read/map/write
//! pipeline with bounded handoffs, following a `kt_pipeline`-style
//! structure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::bounded;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::align::{Aligner, MappingRecord};
use crate::arena::ScratchArena;
use crate::error::MapError;
use crate::index::Index;
use crate::io::{Batch, Query, SequenceReader, Serializer};
use crate::lowcomplexity::LowComplexityDetector;
use crate::options::{OptFlags, Options};
use crate::query::QueryPipeline;
use crate::sketch::Sketcher;

/// One query's mapping output, tagged with its input sequence id so Stage 2
/// can emit output in strict input order even though Stage 1 is unordered
/// internally.
pub struct MappedQuery {
    pub seq_id: u64,
    pub qname: String,
    pub qlen: u32,
    pub records: Vec<MappingRecord>,
}

enum WorkItem<T> {
    Batch(T),
    Done,
}

/// Runs the read/map/write pipeline to completion against a shared,
/// read-only `index`. `cancel`, if set before Stage 0 observes it, stops the
/// pipeline at mini-batch granularity: in-flight mini-batches still drain
/// through Stage 1/2, but no further batches are read.
pub struct BatchPipeline<'a, I, S, L, A, W> {
    pub options: &'a Options,
    pub index: &'a I,
    pub sketcher: &'a S,
    pub lc_detector: Option<&'a L>,
    pub aligner: &'a A,
    pub serializer: &'a W,
}

impl<'a, I, S, L, A, W> BatchPipeline<'a, I, S, L, A, W>
where
    I: Index,
    S: Sketcher,
    L: LowComplexityDetector,
    A: Aligner,
    W: Serializer,
{
    pub fn new(
        options: &'a Options,
        index: &'a I,
        sketcher: &'a S,
        lc_detector: Option<&'a L>,
        aligner: &'a A,
        serializer: &'a W,
    ) -> Self {
        Self { options, index, sketcher, lc_detector, aligner, serializer }
    }

    /// Drives `reader` to exhaustion (or until `cancel` fires), mapping
    /// every query and streaming serialized output lines to `write_line`.
    ///
    /// `n_threads <= 1` runs Stage 0/1/2 as one sequential loop with no
    /// handoff threads. Otherwise Stage 1 fans out across a `rayon::ThreadPool`
    /// sized to `n_threads`, scoped to this call so arena reuse never leaks
    /// across batches from different `run` invocations.
    pub fn run<R: SequenceReader + Send>(
        &self,
        mut reader: R,
        cancel: Arc<AtomicBool>,
        mut write_line: impl FnMut(String),
    ) -> Result<(), MapError> {
        if self.options.n_threads <= 1 {
            return self.run_sequential(reader, cancel, write_line);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.n_threads)
            .build()
            .map_err(|e| MapError::InputOpen(format!("failed to start {} worker threads: {e}", self.options.n_threads)))?;

        tracing::info!(n_threads = self.options.n_threads, "starting batch pipeline");
        let mut n_queries = 0u64;

        let (read_tx, read_rx) = bounded::<WorkItem<Batch>>(1);
        let (map_tx, map_rx) = bounded::<WorkItem<Vec<MappedQuery>>>(1);

        let result = std::thread::scope(|scope| {
            // Stage 0: read.
            let read_handle = scope.spawn(|| -> Result<(), MapError> {
                let mut next_seq_id = 0u64;
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let want_qual = !self.options.flags.contains(OptFlags::NO_QUAL);
                    let records = reader
                        .read_batch(self.options.mini_batch_size, want_qual)
                        .map_err(|e| MapError::InputOpen(e.to_string()))?;
                    let records = match records {
                        Some(r) if !r.is_empty() => r,
                        _ => break,
                    };
                    tracing::debug!(batch_size = records.len(), "read mini-batch");
                    let queries = records
                        .into_iter()
                        .map(|record| {
                            let q = Query { seq_id: next_seq_id, record };
                            next_seq_id += 1;
                            q
                        })
                        .collect();
                    if read_tx.send(WorkItem::Batch(Batch { queries })).is_err() {
                        break;
                    }
                }
                let _ = read_tx.send(WorkItem::Done);
                Ok(())
            });

            // Stage 1: map. One ScratchArena per pool worker thread, reused
            // across mini-batches for the lifetime of the pipeline.
            let map_handle = scope.spawn(|| {
                loop {
                    let item = match read_rx.recv() {
                        Ok(item) => item,
                        Err(_) => break,
                    };
                    let batch = match item {
                        WorkItem::Batch(b) => b,
                        WorkItem::Done => {
                            let _ = map_tx.send(WorkItem::Done);
                            break;
                        }
                    };

                    let mut mapped: Vec<MappedQuery> = pool.install(|| {
                        batch
                            .queries
                            .par_iter()
                            .map_init(ScratchArena::new, |arena, query| self.map_one(query, arena))
                            .collect()
                    });

                    // Stage 1 is internally unordered (the pool fans out
                    // across queries); restore input order before handing
                    // off, so Stage 2 only ever appends.
                    mapped.sort_unstable_by_key(|m| m.seq_id);
                    tracing::debug!(n_workers = self.options.n_threads, mapped = mapped.len(), "mapped mini-batch");

                    if map_tx.send(WorkItem::Batch(mapped)).is_err() {
                        break;
                    }
                }
            });

            // Stage 2: write.
            loop {
                match map_rx.recv() {
                    Ok(WorkItem::Batch(mapped)) => {
                        for m in mapped {
                            n_queries += 1;
                            self.emit(&m, &mut write_line);
                        }
                    }
                    Ok(WorkItem::Done) | Err(_) => break,
                }
            }

            map_handle.join().expect("map stage panicked");
            read_handle.join().expect("read stage panicked")
        });

        tracing::info!(n_queries, "batch pipeline finished");
        result
    }

    /// `n_threads <= 1` path: reads, maps, and writes each mini-batch in
    /// turn on the calling thread, with a single `ScratchArena` reused
    /// across the whole run. No handoff channels, no stage threads.
    fn run_sequential<R: SequenceReader>(
        &self,
        mut reader: R,
        cancel: Arc<AtomicBool>,
        mut write_line: impl FnMut(String),
    ) -> Result<(), MapError> {
        tracing::info!(n_threads = 1, "starting batch pipeline (sequential)");
        let mut arena = ScratchArena::new();
        let mut next_seq_id = 0u64;
        let mut n_queries = 0u64;

        loop {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let want_qual = !self.options.flags.contains(OptFlags::NO_QUAL);
            let records = reader
                .read_batch(self.options.mini_batch_size, want_qual)
                .map_err(|e| MapError::InputOpen(e.to_string()))?;
            let records = match records {
                Some(r) if !r.is_empty() => r,
                _ => break,
            };
            tracing::debug!(batch_size = records.len(), "read mini-batch");

            for record in records {
                let query = Query { seq_id: next_seq_id, record };
                next_seq_id += 1;
                let mapped = self.map_one(&query, &mut arena);
                n_queries += 1;
                self.emit(&mapped, &mut write_line);
            }
        }

        tracing::info!(n_queries, "batch pipeline finished");
        Ok(())
    }

    /// Runs one query through a fresh `QueryPipeline` against `arena`.
    /// A query the pipeline errors on (rather than simply finding nothing)
    /// is reported as unmapped, matching `emit`'s handling of an empty
    /// `records` list.
    fn map_one(&self, query: &Query, arena: &mut ScratchArena) -> MappedQuery {
        let qname = String::from_utf8_lossy(query.record.definition().name()).into_owned();
        let seq: &[u8] = query.record.sequence().as_ref();
        let pipeline = QueryPipeline::new(self.options, self.sketcher, self.lc_detector, self.aligner);
        let records = pipeline.run(self.index, Some(qname.as_str()), seq, arena).unwrap_or_else(|_| Vec::new());
        tracing::trace!(
            seq_id = query.seq_id,
            worker = ?std::thread::current().id(),
            n_chains = records.len(),
            "mapped query"
        );
        MappedQuery {
            seq_id: query.seq_id,
            qname,
            qlen: seq.len() as u32,
            records,
        }
    }

    fn emit(&self, mapped: &MappedQuery, write_line: &mut impl FnMut(String)) {
        if mapped.records.is_empty() {
            if self.options.flags.contains(OptFlags::OUT_SAM) {
                write_line(self.serializer.write_sam(&mapped.qname, None));
            }
            return;
        }
        for record in &mapped.records {
            let line = if self.options.flags.contains(OptFlags::OUT_SAM) {
                self.serializer.write_sam(&mapped.qname, Some(record))
            } else {
                self.serializer.write_paf(&mapped.qname, mapped.qlen, record)
            };
            write_line(line);
        }
    }
}
