use crate::binning::BucketKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running statistics of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Number of documents that landed in the bucket.
    pub count: u64,
    /// Sum of accumulated weights ("bin content").
    pub sum: f64,
    /// Sum of squared weights; `sqrt(sum_of_squares)` is the reported error.
    pub sum_of_squares: f64,
}

impl BucketStats {
    /// Statistics of a bucket holding a single weight.
    pub fn single(weight: f64) -> Self {
        Self {
            count: 1,
            sum: weight,
            sum_of_squares: weight * weight,
        }
    }

    /// Fold one more weight into the bucket.
    #[inline]
    pub fn record(&mut self, weight: f64) {
        self.count += 1;
        self.sum += weight;
        self.sum_of_squares += weight * weight;
    }

    /// Entrywise addition, used when merging partitions.
    #[inline]
    pub fn merge(&mut self, other: &BucketStats) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
    }

    /// Statistical error of the bin content.
    pub fn error(&self) -> f64 {
        self.sum_of_squares.sqrt()
    }
}

/// A bucket key together with its statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub key: BucketKey,
    #[serde(flatten)]
    pub stats: BucketStats,
}

impl BucketEntry {
    pub fn new(key: BucketKey, count: u64, sum: f64, sum_of_squares: f64) -> Self {
        Self {
            key,
            stats: BucketStats {
                count,
                sum,
                sum_of_squares,
            },
        }
    }

    /// A zero-valued entry, used to materialise missing sentinels.
    pub fn empty(key: BucketKey) -> Self {
        Self {
            key,
            stats: BucketStats::default(),
        }
    }

    pub fn count(&self) -> u64 {
        self.stats.count
    }

    pub fn sum(&self) -> f64 {
        self.stats.sum
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.stats.sum_of_squares
    }
}

/// Per-partition mapping from bucket key to running statistics.
///
/// Owned by exactly one collector for the duration of a partition scan, so no
/// synchronisation is needed. Iteration order is unspecified; presentation
/// order is imposed later by an [`OrderPolicy`](crate::order::OrderPolicy).
#[derive(Debug, Default)]
pub struct Accumulator {
    buckets: HashMap<BucketKey, BucketStats>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::with_capacity(capacity),
        }
    }

    /// Record one weight in `bucket`, inserting the bucket on first sight.
    #[inline]
    pub fn accumulate(&mut self, bucket: BucketKey, weight: f64) {
        self.buckets
            .entry(bucket)
            .and_modify(|stats| stats.record(weight))
            .or_insert_with(|| BucketStats::single(weight));
    }

    /// Add a whole entry, as produced by another partition.
    pub fn merge_entry(&mut self, entry: &BucketEntry) {
        self.buckets
            .entry(entry.key)
            .and_modify(|stats| stats.merge(&entry.stats))
            .or_insert(entry.stats);
    }

    /// Insert a zero-valued entry for `key` if it is not already present.
    pub fn ensure_bucket(&mut self, key: BucketKey) {
        self.buckets.entry(key).or_default();
    }

    pub fn get(&self, key: &BucketKey) -> Option<&BucketStats> {
        self.buckets.get(key)
    }

    /// Number of occupied buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Copy every occupied bucket out as an entry list.
    pub fn entries(&self) -> Vec<BucketEntry> {
        self.buckets
            .iter()
            .map(|(key, stats)| BucketEntry { key: *key, stats: *stats })
            .collect()
    }

    /// Consume the accumulator into its entry list.
    pub fn into_entries(self) -> Vec<BucketEntry> {
        self.buckets
            .into_iter()
            .map(|(key, stats)| BucketEntry { key, stats })
            .collect()
    }

    /// Drop all buckets while keeping the allocation, ready for reuse.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buckets.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_inserts_then_updates() {
        let mut acc = Accumulator::new();
        acc.accumulate(BucketKey::Bin(2), 2.0);
        acc.accumulate(BucketKey::Bin(2), 2.5);
        acc.accumulate(BucketKey::Bin(1), 1.0);

        assert_eq!(acc.len(), 2);
        let two = acc.get(&BucketKey::Bin(2)).unwrap();
        assert_eq!(two.count, 2);
        assert_eq!(two.sum, 4.5);
        assert_eq!(two.sum_of_squares, 4.0 + 6.25);

        let one = acc.get(&BucketKey::Bin(1)).unwrap();
        assert_eq!(*one, BucketStats::single(1.0));
    }

    #[test]
    fn test_merge_entry_adds_entrywise() {
        let mut acc = Accumulator::new();
        acc.accumulate(BucketKey::Overflow, 10.0);
        acc.merge_entry(&BucketEntry::new(BucketKey::Overflow, 2, 5.0, 13.0));
        acc.merge_entry(&BucketEntry::new(BucketKey::Bin(0), 1, 1.0, 1.0));

        let overflow = acc.get(&BucketKey::Overflow).unwrap();
        assert_eq!(overflow.count, 3);
        assert_eq!(overflow.sum, 15.0);
        assert_eq!(overflow.sum_of_squares, 113.0);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_ensure_bucket_keeps_existing() {
        let mut acc = Accumulator::new();
        acc.accumulate(BucketKey::Underflow, -3.0);
        acc.ensure_bucket(BucketKey::Underflow);
        acc.ensure_bucket(BucketKey::Overflow);

        assert_eq!(acc.get(&BucketKey::Underflow).unwrap().sum, -3.0);
        assert_eq!(*acc.get(&BucketKey::Overflow).unwrap(), BucketStats::default());
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut acc = Accumulator::with_capacity(64);
        for bin in 0..32 {
            acc.accumulate(BucketKey::Bin(bin), bin as f64);
        }
        let capacity = acc.capacity();
        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.capacity(), capacity);
    }

    #[test]
    fn test_bucket_error() {
        let stats = BucketEntry::new(BucketKey::Bin(0), 2, 7.0, 25.0);
        assert_eq!(stats.stats.error(), 5.0);
    }
}
