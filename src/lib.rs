//! # Decimal Histogram Library
//!
//! Distributed histogram aggregation over floating-point document values.
//! Each partition of a data set is scanned by its own collector, which sorts
//! every document's numeric value into a bucket and accumulates count, sum
//! and sum of squares per bucket. The per-partition partial results are then
//! merged once into a single histogram with summary statistics.
//!
//! ## Binning Modes
//!
//! - **Interval**: unbounded buckets of a fixed width, optionally shifted by
//!   an offset
//! - **Fixed range**: a fixed number of equal-width buckets over
//!   `[xmin, xmax]`, plus underflow and overflow buckets for values outside
//!
//! ## Architecture Overview
//!
//! - `binning`: bucket keys, binning modes and specialised binning functions
//! - `accumulator` / `pool`: per-bucket statistics and leased accumulator storage
//! - `source`: document sources (fields, key/value fields, expressions)
//! - `collector`: the per-partition collection loop
//! - `histogram` / `reduce`: partial and final results, and the merge
//! - `order`: presentation order of the final entries
//! - `codec`: binary frame for moving partial results between nodes
//! - `config` / `response`: JSON request and response representations
//! - `runner`: end-to-end query execution on a worker pool
//! - `results`, `cli`, `logging`, `utils`: the command line front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use decimal_histogram::{FacetRequest, HistogramRunner, Partition, RunnerOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = FacetRequest::from_json(r#"{"field": "price", "interval": 0.5}"#)?.validate()?;
//!     let runner = HistogramRunner::new(config, RunnerOptions::default())?;
//!
//!     let partitions = vec![
//!         Partition::from_values(0, "price", &[1.0, 2.0]),
//!         Partition::from_values(1, "price", &[2.5, 10.0]),
//!     ];
//!     let histogram = runner.run(&partitions)?;
//!
//!     println!("mean = {}, rms = {}", histogram.mean(), histogram.rms());
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod binning;

/// Command-line interface and input loading
///
/// Argument parsing with clap, request assembly from a JSON file and flags,
/// and newline-delimited JSON input split into partitions.
pub mod cli;

pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod histogram;
pub mod logging;
pub mod order;
pub mod pool;
pub mod reduce;
pub mod response;

/// Report assembly and output
///
/// Wraps facet responses in a report envelope with run metadata and writes
/// it as JSON to a file or standard output.
pub mod results;

pub mod runner;
pub mod source;
pub mod utils;

pub use accumulator::{Accumulator, BucketEntry, BucketStats};
pub use binning::{Binning, BinningMode, BucketKey, FixedRangeBinning, IntervalBinning};
pub use collector::Collector;
pub use config::{FacetConfig, FacetRequest, ValueSource};
pub use error::{CodecError, HistogramError};
pub use histogram::{HistogramResult, PartialResult, Statistics};
pub use order::OrderPolicy;
pub use pool::{AccumulatorPool, PooledAccumulator};
pub use reduce::reduce;
pub use response::HistogramResponse;
pub use runner::{HistogramRunner, QueryOutcome, RunnerOptions};
pub use source::{Expression, ExpressionEngine, Partition, Script};

/// The current version of the decimal histogram crate
///
/// Populated from Cargo.toml and recorded in every written report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Default accumulator pool lease limit
    ///
    /// Raised to the worker thread count when that is larger, so every worker
    /// can hold a lease at the same time.
    pub const POOL_CAPACITY: usize = 64;

    /// Partial results go through the wire codec unless disabled
    pub const TRANSPORT: bool = true;

    /// Facet name used in reports when none is given
    pub const FACET_NAME: &str = "histogram";
}
