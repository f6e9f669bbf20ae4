//! # Query Runner
//!
//! Orchestrates one histogram query end to end: one [`Collector`] per
//! partition on a worker pool, an optional trip through the wire codec for
//! every partial result, and a single reduce into the final histogram.
//!
//! ## Execution Lifecycle
//!
//! 1. **Preflight**: the value source is checked against the partitions
//!    (field mappings, expression engine availability)
//! 2. **Dispatch**: the binning mode is resolved once into a concrete
//!    [`Binning`] type, so every partition runs a specialised loop
//! 3. **Collection**: partitions are collected in parallel on a dedicated
//!    rayon pool, each against its own pool-leased accumulator
//! 4. **Transport**: when enabled, each partial result is encoded and decoded
//!    again exactly as it would cross a node boundary
//! 5. **Reduce**: all partial results are merged once, then ordered
//!
//! Any partition failure fails the whole query; partial results of the other
//! partitions are discarded and their leases returned.

use crate::binning::{Binning, BinningMode, FixedRangeBinning, IntervalBinning};
use crate::codec;
use crate::collector::Collector;
use crate::config::{FacetConfig, ValueSource};
use crate::defaults;
use crate::error::{HistogramError, Result};
use crate::histogram::{HistogramResult, PartialResult};
use crate::pool::AccumulatorPool;
use crate::reduce::reduce;
use crate::source::{ExpressionEngine, FieldSampler, KeyValueSampler, Partition, Sampler, ScriptSampler};
use crate::utils;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, trace, warn, Span};

/// Runtime knobs of a [`HistogramRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Worker threads collecting partitions.
    pub threads: usize,
    /// Maximum number of accumulator leases outstanding at once.
    pub pool_capacity: usize,
    /// Send every partial result through the wire codec before reducing.
    pub transport: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        let threads = utils::get_cpu_cores();
        Self {
            threads,
            pool_capacity: defaults::POOL_CAPACITY.max(threads),
            transport: defaults::TRANSPORT,
        }
    }
}

/// Everything a finished query reports besides the histogram itself.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query_id: String,
    pub histogram: HistogramResult,
    pub partitions: usize,
    pub documents: u64,
    pub skipped: u64,
    /// Total encoded size of all partial results, `0` without transport.
    pub wire_bytes: usize,
    pub elapsed: Duration,
}

struct PartitionOutcome {
    partial: PartialResult,
    documents: u64,
    skipped: u64,
    wire_bytes: usize,
}

/// Single source of truth for displaying a runner's configuration.
struct RunnerDisplay<'a> {
    runner: &'a HistogramRunner,
}

impl fmt::Display for RunnerDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.runner.config;
        let options = &self.runner.options;
        writeln!(f, "Decimal histogram query")?;
        writeln!(f, "  Binning:            {}", config.binning)?;
        writeln!(f, "  Source:             {}", config.source)?;
        writeln!(f, "  Order:              {}", config.order)?;
        writeln!(f, "  Worker Threads:     {}", options.threads)?;
        writeln!(f, "  Pool Capacity:      {}", options.pool_capacity)?;
        write!(
            f,
            "  Transport:          {}",
            if options.transport { "encoded" } else { "in-process" }
        )
    }
}

/// Runs histogram queries for one validated facet configuration.
pub struct HistogramRunner {
    config: FacetConfig,
    options: RunnerOptions,
    pool: AccumulatorPool,
    workers: rayon::ThreadPool,
    engine: Option<Arc<dyn ExpressionEngine>>,
}

impl HistogramRunner {
    /// Create a runner with its accumulator pool and worker threads.
    pub fn new(config: FacetConfig, options: RunnerOptions) -> Result<Self> {
        if options.threads == 0 {
            return Err(HistogramError::config("worker thread count must be at least 1"));
        }
        if options.pool_capacity < options.threads {
            warn!(
                "Pool capacity {} is below the worker count {}; partitions may fail with pool exhaustion",
                options.pool_capacity, options.threads
            );
        }

        let pool = AccumulatorPool::new(options.pool_capacity)?;
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|index| format!("histogram-worker-{}", index))
            .build()
            .map_err(|e| HistogramError::config(format!("failed to start worker threads: {}", e)))?;

        Ok(Self {
            config,
            options,
            pool,
            workers,
            engine: None,
        })
    }

    /// Register the engine used to bind key/value scripts.
    pub fn with_expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn config(&self) -> &FacetConfig {
        &self.config
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn pool(&self) -> &AccumulatorPool {
        &self.pool
    }

    /// Human-readable summary of this runner's configuration.
    pub fn describe(&self) -> String {
        RunnerDisplay { runner: self }.to_string()
    }

    /// Run the query over `partitions` and return the final histogram.
    pub fn run(&self, partitions: &[Partition]) -> Result<HistogramResult> {
        self.execute(partitions).map(|outcome| outcome.histogram)
    }

    /// Run the query over `partitions`, reporting collection totals as well.
    pub fn execute(&self, partitions: &[Partition]) -> Result<QueryOutcome> {
        let query_id = utils::generate_query_id();
        let span = info_span!("query", id = %query_id);
        let _guard = span.enter();
        let started = Instant::now();

        info!(
            "Running {} over {} partitions",
            self.config.binning,
            partitions.len()
        );
        self.preflight(partitions)?;

        let outcomes = match self.config.binning {
            BinningMode::Interval { interval, offset } => {
                self.collect_all(IntervalBinning::new(interval, offset)?, partitions)?
            }
            BinningMode::FixedRange { nbins, xmin, xmax } => {
                self.collect_all(FixedRangeBinning::new(nbins, xmin, xmax)?, partitions)?
            }
        };

        let documents = outcomes.iter().map(|o| o.documents).sum();
        let skipped = outcomes.iter().map(|o| o.skipped).sum();
        let wire_bytes = outcomes.iter().map(|o| o.wire_bytes).sum();
        let partials = outcomes.into_iter().map(|o| o.partial).collect();

        let histogram = reduce(self.config.binning, partials, self.config.order)?;
        let elapsed = started.elapsed();
        info!(
            "Query finished: {} documents ({} skipped), {} buckets in {}",
            documents,
            skipped,
            histogram.entries().len(),
            utils::format_duration(elapsed)
        );

        Ok(QueryOutcome {
            query_id,
            histogram,
            partitions: partitions.len(),
            documents,
            skipped,
            wire_bytes,
            elapsed,
        })
    }

    /// Reject queries that cannot succeed before any partition is touched.
    fn preflight(&self, partitions: &[Partition]) -> Result<()> {
        if self.config.source.is_script() && self.engine.is_none() {
            return Err(HistogramError::config(
                "scripted decimal histogram requires an expression engine",
            ));
        }

        let populated: Vec<&Partition> = partitions.iter().filter(|p| !p.is_empty()).collect();
        if populated.is_empty() {
            debug!("No documents in any partition, skipping mapping check");
            return Ok(());
        }
        for field in self.config.source.fields() {
            if !populated.iter().any(|p| p.has_field(field)) {
                return Err(HistogramError::config(format!(
                    "failed to find mapping for [{}]",
                    field
                )));
            }
        }
        Ok(())
    }

    fn collect_all<B: Binning>(
        &self,
        binning: B,
        partitions: &[Partition],
    ) -> Result<Vec<PartitionOutcome>> {
        // Workers do not inherit the caller's entered span.
        let span = Span::current();
        self.workers.install(|| {
            partitions
                .par_iter()
                .map(|partition| span.in_scope(|| self.collect_partition(binning, partition)))
                .collect()
        })
    }

    fn collect_partition<B: Binning>(
        &self,
        binning: B,
        partition: &Partition,
    ) -> Result<PartitionOutcome> {
        debug!(
            "Collecting partition {} ({} documents)",
            partition.id(),
            partition.len()
        );

        let outcome = match &self.config.source {
            ValueSource::Field(field) => {
                let column = partition.column(field);
                self.drive(binning, FieldSampler::new(&column), partition)?
            }
            ValueSource::KeyValueFields {
                key_field,
                value_field,
            } => {
                let keys = partition.column(key_field);
                let values = partition.column(value_field);
                self.drive(binning, KeyValueSampler::new(&keys, &values), partition)?
            }
            ValueSource::Script { key, value } => {
                let engine = self.engine.as_ref().ok_or_else(|| {
                    HistogramError::config("scripted decimal histogram requires an expression engine")
                })?;
                let key = engine.bind(key, partition)?;
                let value = engine.bind(value, partition)?;
                self.drive(binning, ScriptSampler::new(key, value), partition)?
            }
        };

        if self.options.transport {
            self.transport(outcome)
        } else {
            Ok(outcome)
        }
    }

    fn drive<B: Binning, S: Sampler>(
        &self,
        binning: B,
        sampler: S,
        partition: &Partition,
    ) -> Result<PartitionOutcome> {
        let mut collector = Collector::new(binning, &self.pool)?;
        collector.set_next_source(sampler);
        collector.collect_all(partition.doc_ids())?;
        let documents = collector.documents();
        let skipped = collector.skipped();
        Ok(PartitionOutcome {
            partial: collector.finish(),
            documents,
            skipped,
            wire_bytes: 0,
        })
    }

    /// Ship a partial result through the wire codec and back.
    fn transport(&self, outcome: PartitionOutcome) -> Result<PartitionOutcome> {
        let frame = codec::encode_partial(&outcome.partial, self.config.order);
        let (partial, _) = codec::decode_partial(&frame)?;
        trace!(
            "Partial result with {} buckets encoded to {} bytes",
            partial.len(),
            frame.len()
        );
        Ok(PartitionOutcome {
            partial,
            wire_bytes: frame.len(),
            ..outcome
        })
    }
}
