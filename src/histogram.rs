//! # Partial and Final Histograms
//!
//! [`PartialResult`] is the frozen output of one partition scan.
//! [`HistogramResult`] is the single reduced histogram of a query, with its
//! entries sorted by the requested [`OrderPolicy`] and its summary
//! [`Statistics`] computed.
//!
//! ## Statistics
//!
//! Computed over ordinary buckets only; the underflow and overflow buckets
//! contribute their bin content to `underflow` / `overflow` and nothing else.
//!
//! - `total_count = Σ count`
//! - `integral = Σ sum` (sum of weights, not of counts)
//! - `mean = Σ(position(key) · sum) / integral`
//! - `rms = sqrt(Σ(position(key) · sum − mean)²) / integral`
//!
//! where `position(key) = key · width`, plus `xmin` in fixed-range mode.
//! When `integral == 0` both `mean` and `rms` are NaN, meaning "no data".

use crate::accumulator::BucketEntry;
use crate::binning::{BinningMode, BucketKey};
use crate::order::OrderPolicy;
use serde::{Deserialize, Serialize};

/// Frozen accumulator of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    mode: BinningMode,
    entries: Vec<BucketEntry>,
}

impl PartialResult {
    pub fn new(mode: BinningMode, entries: Vec<BucketEntry>) -> Self {
        Self { mode, entries }
    }

    pub fn mode(&self) -> BinningMode {
        self.mode
    }

    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BucketEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summary statistics of this partition alone.
    pub fn statistics(&self) -> Statistics {
        Statistics::compute(&self.mode, &self.entries)
    }
}

/// Summary statistics of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_count: u64,
    pub integral: f64,
    pub mean: f64,
    pub rms: f64,
    pub underflow: f64,
    pub overflow: f64,
}

impl Statistics {
    /// Compute statistics over `entries` binned under `mode`.
    pub fn compute(mode: &BinningMode, entries: &[BucketEntry]) -> Self {
        let mut total_count = 0u64;
        let mut integral = 0.0;
        let mut moment = 0.0;
        let mut underflow = 0.0;
        let mut overflow = 0.0;

        for entry in entries {
            match entry.key {
                BucketKey::Bin(bin) => {
                    total_count += entry.count();
                    integral += entry.sum();
                    moment += mode.bin_position(bin) * entry.sum();
                }
                BucketKey::Underflow => underflow = entry.sum(),
                BucketKey::Overflow => overflow = entry.sum(),
            }
        }

        if integral == 0.0 {
            return Self {
                total_count,
                integral,
                mean: f64::NAN,
                rms: f64::NAN,
                underflow,
                overflow,
            };
        }

        let mean = moment / integral;
        let spread: f64 = entries
            .iter()
            .filter_map(|entry| {
                entry.key.bin().map(|bin| {
                    let deviation = mode.bin_position(bin) * entry.sum() - mean;
                    deviation * deviation
                })
            })
            .sum();

        Self {
            total_count,
            integral,
            mean,
            rms: spread.sqrt() / integral,
            underflow,
            overflow,
        }
    }

    /// `false` when the histogram holds no weight and mean/rms are undefined.
    pub fn has_data(&self) -> bool {
        !self.mean.is_nan()
    }
}

/// The reduced histogram of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramResult {
    mode: BinningMode,
    order: OrderPolicy,
    entries: Vec<BucketEntry>,
    stats: Statistics,
}

impl HistogramResult {
    /// Sort `entries` under `order` and compute statistics.
    pub fn from_entries(mode: BinningMode, order: OrderPolicy, mut entries: Vec<BucketEntry>) -> Self {
        order.sort(&mut entries);
        let stats = Statistics::compute(&mode, &entries);
        Self {
            mode,
            order,
            entries,
            stats,
        }
    }

    /// Reassemble a histogram whose statistics were computed elsewhere.
    pub(crate) fn from_parts(
        mode: BinningMode,
        order: OrderPolicy,
        entries: Vec<BucketEntry>,
        stats: Statistics,
    ) -> Self {
        Self {
            mode,
            order,
            entries,
            stats,
        }
    }

    pub fn mode(&self) -> BinningMode {
        self.mode
    }

    pub fn order(&self) -> OrderPolicy {
        self.order
    }

    /// All entries, sentinels included, in presentation order.
    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }

    /// Entries without the underflow/overflow buckets.
    pub fn ordinary_entries(&self) -> impl Iterator<Item = &BucketEntry> + '_ {
        self.entries.iter().filter(|entry| !entry.key.is_sentinel())
    }

    pub fn get(&self, key: BucketKey) -> Option<&BucketEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn total_count(&self) -> u64 {
        self.stats.total_count
    }

    pub fn integral(&self) -> f64 {
        self.stats.integral
    }

    pub fn mean(&self) -> f64 {
        self.stats.mean
    }

    pub fn rms(&self) -> f64 {
        self.stats.rms
    }

    pub fn underflow(&self) -> f64 {
        self.stats.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.stats.overflow
    }

    /// Re-sort under a different policy. Statistics are order-independent.
    pub fn with_order(mut self, order: OrderPolicy) -> Self {
        order.sort(&mut self.entries);
        self.order = order;
        self
    }
}
