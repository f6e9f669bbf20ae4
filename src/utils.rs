//! # Utility Functions and Helper Module
//!
//! Small helpers shared by the runner, the report writer and the command line
//! front end: identifiers, human-readable formatting, validation of runtime
//! knobs and system information.
//!
//! ## Key Functionality Categories
//!
//! - **Identifiers**: Unique query ids for log correlation and reports
//! - **Formatting**: Human-readable display of durations and counts
//! - **Validation**: Runtime parameter validation with clear error messages
//! - **System Information**: CPU detection for worker defaults
//!
//! ## Usage Examples
//!
//! ```rust
//! use decimal_histogram::utils::*;
//! use std::time::Duration;
//!
//! let duration_str = format_duration(Duration::from_micros(1500));
//! assert_eq!(duration_str, "1.50ms");
//!
//! # fn main() -> anyhow::Result<()> {
//! validate_thread_count(4)?;
//! validate_pool_capacity(8, 4)?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on worker threads accepted from the command line.
const MAX_THREADS: usize = 1024;

/// Generate a unique identifier for a histogram query
///
/// Creates a UUID v4 string used to correlate the log lines of one query
/// across worker threads and to tag the written report.
///
/// ## Returns
/// String representation of a UUID v4 (e.g., "550e8400-e29b-41d4-a716-446655440000")
pub fn generate_query_id() -> String {
    Uuid::new_v4().to_string()
}

/// Render a query duration with the largest unit that keeps it readable.
///
/// ```rust
/// # use decimal_histogram::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    match nanos {
        0..=999 => format!("{}ns", nanos),
        1_000..=999_999 => format!("{:.2}μs", nanos as f64 / 1e3),
        1_000_000..=999_999_999 => format!("{:.2}ms", nanos as f64 / 1e6),
        _ if duration.as_secs() < 60 => format!("{:.2}s", duration.as_secs_f64()),
        _ => {
            let secs = duration.as_secs();
            let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
            if hours == 0 {
                format!("{}m {}s", minutes, seconds)
            } else {
                format!("{}h {}m {}s", hours, minutes, seconds)
            }
        }
    }
}

/// Format a document throughput for display
///
/// ## Examples
///
/// ```rust
/// # use decimal_histogram::utils::format_doc_rate;
/// assert_eq!(format_doc_rate(500.0), "500 docs/s");
/// assert_eq!(format_doc_rate(2_500_000.0), "2.50M docs/s");
/// ```
pub fn format_doc_rate(docs_per_second: f64) -> String {
    if docs_per_second < 1_000.0 {
        format!("{:.0} docs/s", docs_per_second)
    } else if docs_per_second < 1_000_000.0 {
        format!("{:.2}K docs/s", docs_per_second / 1_000.0)
    } else {
        format!("{:.2}M docs/s", docs_per_second / 1_000_000.0)
    }
}

/// Validate the worker thread count
///
/// ## Validation Rules
///
/// - **Minimum**: 1 worker (a query needs somewhere to run)
/// - **Maximum**: 1024 workers (prevent resource exhaustion)
pub fn validate_thread_count(threads: usize) -> Result<()> {
    if threads == 0 {
        anyhow::bail!("Thread count cannot be zero");
    }
    if threads > MAX_THREADS {
        anyhow::bail!(
            "Thread count {} is too high (maximum {})",
            threads,
            MAX_THREADS
        );
    }
    Ok(())
}

/// Validate the accumulator pool lease limit against the worker count
///
/// Each worker holds at most one lease at a time, so a capacity below the
/// thread count would make partitions fail with pool exhaustion under load.
///
/// ## Parameters
/// - `capacity`: Maximum number of outstanding accumulator leases
/// - `threads`: Number of worker threads collecting partitions
pub fn validate_pool_capacity(capacity: usize, threads: usize) -> Result<()> {
    if capacity == 0 {
        anyhow::bail!("Pool capacity cannot be zero");
    }
    if capacity < threads {
        anyhow::bail!(
            "Pool capacity {} is smaller than the worker thread count {}",
            capacity,
            threads
        );
    }
    Ok(())
}

/// Get the number of CPU cores available
///
/// Returns the number of logical CPU cores available to the current process,
/// used as the default worker thread count.
///
/// ## Implementation
///
/// Uses the `num_cpus` crate which accounts for container resource limits
/// and process affinity restrictions.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}
