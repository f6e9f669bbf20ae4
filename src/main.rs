//! # Decimal Histogram - Main Entry Point
//!
//! Command line front end: loads newline-delimited JSON partitions, runs one
//! decimal histogram facet over them and writes the JSON report.
//!
//! ## Execution Steps
//!
//! 1. **Parse arguments**: Processes command-line configuration
//! 2. **Initialize logging**: Console output, plus an optional log file
//! 3. **Build the request**: From a request file and/or flags, validated up front
//! 4. **Load partitions**: One per input file, or re-split round-robin
//! 5. **Run the query**: Collect, optionally transport, reduce
//! 6. **Write the report**: To the output file or standard output
//!
//! ## Error Handling
//!
//! The application uses `anyhow::Result` throughout; any failure ends the run
//! with a non-zero exit status and no report is written.

use anyhow::{Context, Result};
use clap::Parser;
use decimal_histogram::{
    cli::Args, logging, results::ResultsManager, utils, HistogramRunner, RunnerOptions,
};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the non-blocking file writer flushes.
    let _log_guard = logging::init_logging(args.verbose, args.log_file.as_deref())?;

    info!("Starting Decimal Histogram v{}", decimal_histogram::VERSION);

    if let Err(e) = run(&args) {
        error!("Histogram query failed: {:#}", e);
        return Err(e);
    }

    info!("Decimal Histogram completed successfully");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let options = RunnerOptions::from(args);
    utils::validate_thread_count(options.threads)?;
    utils::validate_pool_capacity(options.pool_capacity, options.threads)?;

    let config = args
        .build_request()?
        .validate()
        .context("Invalid facet request")?;
    if config.source.is_script() {
        anyhow::bail!("Scripted requests need an expression engine, which the command line does not provide");
    }

    let partitions = args.load_partitions()?;
    let runner = HistogramRunner::new(config, options.clone())?;
    for line in runner.describe().lines() {
        info!("{}", line);
    }

    let outcome = runner.execute(&partitions)?;
    let seconds = outcome.elapsed.as_secs_f64();
    if seconds > 0.0 {
        info!(
            "Throughput: {}",
            utils::format_doc_rate(outcome.documents as f64 / seconds)
        );
    }
    if options.transport {
        info!("Partial results transported in {} bytes", outcome.wire_bytes);
    }

    let mut results_manager = ResultsManager::new(args.output_file.as_deref(), options.threads);
    results_manager.add_facet(&args.name, &outcome);
    results_manager.finalize()
}
