//! # Cross-Partition Reduce
//!
//! Folds the partial results of every partition of a query into one
//! [`HistogramResult`].
//!
//! ## Algorithm
//!
//! 1. **Fast path**: a single partial result is passed through unchanged
//!    apart from sorting.
//! 2. **General path**: entries of all partials are folded into one map with
//!    entrywise addition. The fold is commutative and associative, so the
//!    order in which partitions report does not affect the result.
//! 3. In fixed-range mode both sentinel buckets are materialised with zero
//!    statistics if no partition produced them.
//! 4. Statistics are computed and the entries sorted by the order policy.
//!
//! The reduce either completes or fails as a whole; no partially merged
//! histogram is ever returned.

use crate::accumulator::Accumulator;
use crate::binning::{BinningMode, BucketKey};
use crate::error::{HistogramError, Result};
use crate::histogram::{HistogramResult, PartialResult};
use crate::order::OrderPolicy;
use tracing::debug;

/// Merge `partials` into the final histogram for `mode`.
pub fn reduce(
    mode: BinningMode,
    mut partials: Vec<PartialResult>,
    order: OrderPolicy,
) -> Result<HistogramResult> {
    if partials.is_empty() {
        return Err(HistogramError::EmptyReduce);
    }
    if let Some(mismatch) = partials.iter().find(|partial| partial.mode() != mode) {
        return Err(HistogramError::IncompatibleBinning {
            expected: mode.to_string(),
            found: mismatch.mode().to_string(),
        });
    }

    if partials.len() == 1 {
        debug!("Single partial result, skipping merge");
        let entries = partials.pop().map(PartialResult::into_entries).unwrap_or_default();
        return Ok(HistogramResult::from_entries(mode, order, entries));
    }

    let widest = partials.iter().map(PartialResult::len).max().unwrap_or(0);
    let mut merged = Accumulator::with_capacity(widest + 2);
    for partial in &partials {
        for entry in partial.entries() {
            merged.merge_entry(entry);
        }
    }

    if mode.has_sentinels() {
        merged.ensure_bucket(BucketKey::Underflow);
        merged.ensure_bucket(BucketKey::Overflow);
    }

    debug!(
        "Merged {} partial results into {} buckets",
        partials.len(),
        merged.len()
    );
    Ok(HistogramResult::from_entries(mode, order, merged.into_entries()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::BucketEntry;

    fn interval() -> BinningMode {
        BinningMode::interval(1.0, 0.0).unwrap()
    }

    #[test]
    fn test_general_path_adds_entrywise() {
        let a = PartialResult::new(
            interval(),
            vec![
                BucketEntry::new(BucketKey::Bin(1), 1, 1.0, 1.0),
                BucketEntry::new(BucketKey::Bin(2), 1, 2.0, 4.0),
            ],
        );
        let b = PartialResult::new(
            interval(),
            vec![
                BucketEntry::new(BucketKey::Bin(2), 1, 2.5, 6.25),
                BucketEntry::new(BucketKey::Bin(10), 1, 10.0, 100.0),
            ],
        );

        let result = reduce(interval(), vec![a, b], OrderPolicy::Key).unwrap();
        assert_eq!(result.entries().len(), 3);
        let two = result.get(BucketKey::Bin(2)).unwrap();
        assert_eq!(two.count(), 2);
        assert_eq!(two.sum(), 4.5);
        assert_eq!(two.sum_of_squares(), 10.25);
        assert_eq!(result.total_count(), 4);
        assert_eq!(result.integral(), 15.5);
    }

    #[test]
    fn test_fast_path_does_not_add_sentinels() {
        let mode = BinningMode::fixed_range(2, 0.0, 4.0).unwrap();
        let partial = PartialResult::new(
            mode,
            vec![
                BucketEntry::new(BucketKey::Bin(1), 2, 4.5, 10.25),
                BucketEntry::new(BucketKey::Bin(0), 1, 1.0, 1.0),
            ],
        );

        let result = reduce(mode, vec![partial], OrderPolicy::Key).unwrap();
        let keys: Vec<_> = result.entries().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![BucketKey::Bin(0), BucketKey::Bin(1)]);
        assert_eq!(result.underflow(), 0.0);
        assert_eq!(result.overflow(), 0.0);
    }

    #[test]
    fn test_general_path_materialises_sentinels() {
        let mode = BinningMode::fixed_range(2, 0.0, 4.0).unwrap();
        let a = PartialResult::new(mode, vec![BucketEntry::new(BucketKey::Bin(0), 1, 1.0, 1.0)]);
        let b = PartialResult::new(
            mode,
            vec![BucketEntry::new(BucketKey::Overflow, 1, 10.0, 100.0)],
        );

        let result = reduce(mode, vec![a, b], OrderPolicy::Key).unwrap();
        let keys: Vec<_> = result.entries().iter().map(|e| e.key).collect();
        assert_eq!(
            keys,
            vec![BucketKey::Underflow, BucketKey::Bin(0), BucketKey::Overflow]
        );
        assert_eq!(result.get(BucketKey::Underflow).unwrap().count(), 0);
        assert_eq!(result.overflow(), 10.0);
        assert_eq!(result.total_count(), 1);
    }

    #[test]
    fn test_empty_partials_merge_to_no_data() {
        let a = PartialResult::new(interval(), Vec::new());
        let b = PartialResult::new(interval(), Vec::new());
        let result = reduce(interval(), vec![a, b], OrderPolicy::Key).unwrap();
        assert!(result.entries().is_empty());
        assert_eq!(result.total_count(), 0);
        assert!(result.mean().is_nan());
        assert!(result.rms().is_nan());
    }

    #[test]
    fn test_rejects_empty_and_incompatible_input() {
        assert!(matches!(
            reduce(interval(), Vec::new(), OrderPolicy::Key),
            Err(HistogramError::EmptyReduce)
        ));

        let other = BinningMode::interval(2.0, 0.0).unwrap();
        let partial = PartialResult::new(other, Vec::new());
        assert!(matches!(
            reduce(interval(), vec![partial], OrderPolicy::Key),
            Err(HistogramError::IncompatibleBinning { .. })
        ));
    }
}
