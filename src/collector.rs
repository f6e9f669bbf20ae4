//! # Partition Collector
//!
//! A [`Collector`] drives one partition scan: for every document it pulls a
//! sample from the bound [`Sampler`], buckets the sample's key with its
//! [`Binning`] and records the weight in a pool-leased accumulator.
//!
//! The collector is generic over both the binning function and the sampler,
//! so each partition runs a loop specialised to one concrete mode with no
//! per-document dispatch.
//!
//! ## Lifecycle
//!
//! 1. [`Collector::new`] leases an empty accumulator from the pool.
//! 2. [`Collector::set_next_source`] binds (or re-binds) a document source;
//!    a partition made of several segments re-binds once per segment.
//! 3. [`Collector::collect`] is called once per matching document.
//! 4. [`Collector::finish`] freezes the accumulator into a [`PartialResult`]
//!    and returns the lease. Dropping the collector at any earlier point
//!    (e.g. after an evaluation error) returns the lease as well.

use crate::binning::Binning;
use crate::error::{HistogramError, Result};
use crate::histogram::PartialResult;
use crate::pool::{AccumulatorPool, PooledAccumulator};
use crate::source::{DocId, Sample, Sampler};
use tracing::debug;

/// Per-partition histogram collector.
pub struct Collector<B, S> {
    binning: B,
    source: Option<S>,
    accumulator: PooledAccumulator,
    documents: u64,
    skipped: u64,
}

impl<B: Binning, S: Sampler> Collector<B, S> {
    /// Create a collector, leasing its accumulator from `pool`.
    pub fn new(binning: B, pool: &AccumulatorPool) -> Result<Self> {
        Ok(Self {
            binning,
            source: None,
            accumulator: pool.acquire()?,
            documents: 0,
            skipped: 0,
        })
    }

    /// Bind the document source for the next run of `collect` calls.
    pub fn set_next_source(&mut self, source: S) {
        self.source = Some(source);
    }

    /// Collect a single document.
    #[inline]
    pub fn collect(&mut self, doc: DocId) -> Result<()> {
        let source = self.source.as_mut().ok_or(HistogramError::NoSource)?;
        self.documents += 1;
        match source.sample(doc)? {
            Some(Sample { key, weight }) if !key.is_nan() => {
                let bucket = self.binning.bucket(key);
                self.accumulator.accumulate(bucket, weight);
            }
            _ => self.skipped += 1,
        }
        Ok(())
    }

    /// Collect every document in `docs`, stopping at the first failure.
    pub fn collect_all<I>(&mut self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = DocId>,
    {
        for doc in docs {
            self.collect(doc)?;
        }
        Ok(())
    }

    /// Documents passed to `collect` so far.
    pub fn documents(&self) -> u64 {
        self.documents
    }

    /// Documents that had no usable value.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Number of occupied buckets so far.
    pub fn buckets(&self) -> usize {
        self.accumulator.len()
    }

    /// Freeze the accumulator into a partial result and release the lease.
    pub fn finish(self) -> PartialResult {
        let entries = self.accumulator.entries();
        debug!(
            "Partition collected: {} documents, {} skipped, {} buckets",
            self.documents,
            self.skipped,
            entries.len()
        );
        PartialResult::new(self.binning.mode(), entries)
    }
}
