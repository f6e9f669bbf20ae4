//! # Binning Function
//!
//! Maps a numeric value to a bucket key under one of two modes:
//!
//! - **Interval**: unbounded key space, `bucket = floor((value + offset) / interval)`.
//! - **Fixed range**: `nbins` ordinary buckets spanning `[xmin, xmax]` plus an
//!   underflow and an overflow bucket for values outside the range.
//!
//! Out-of-range mass is tracked with an explicit three-state [`BucketKey`]
//! instead of reusing extreme integers as in-band markers; the integer
//! extremes only reappear at the wire boundary (see [`BucketKey::to_wire`]).
//!
//! ## Specialisation
//!
//! [`BinningMode`] is the configuration-level tagged union. The hot collection
//! loop never branches on it: the runner dispatches once to one of the
//! [`Binning`] implementations ([`IntervalBinning`] or [`FixedRangeBinning`])
//! and the collector is monomorphised over that type.

use crate::error::{HistogramError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket identifier.
///
/// The derived ordering places `Underflow` before every ordinary bin and
/// `Overflow` after every ordinary bin, which is exactly the key order used
/// for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKey {
    /// Values strictly below `xmin` in fixed-range mode.
    Underflow,
    /// An ordinary bucket index.
    Bin(i64),
    /// Values strictly above `xmax` in fixed-range mode.
    Overflow,
}

impl BucketKey {
    /// Returns `true` for the underflow and overflow buckets.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, BucketKey::Bin(_))
    }

    /// The ordinary bucket index, if any.
    pub fn bin(&self) -> Option<i64> {
        match self {
            BucketKey::Bin(bin) => Some(*bin),
            _ => None,
        }
    }

    /// Integer representation used on the wire and in responses.
    ///
    /// Sentinels map to the minimum and maximum representable key.
    pub fn to_wire(self) -> i64 {
        match self {
            BucketKey::Underflow => i64::MIN,
            BucketKey::Bin(bin) => bin,
            BucketKey::Overflow => i64::MAX,
        }
    }

    /// Inverse of [`BucketKey::to_wire`].
    ///
    /// `with_sentinels` must be `true` only for fixed-range histograms; interval
    /// histograms have no sentinels and every integer is an ordinary bin.
    pub fn from_wire(raw: i64, with_sentinels: bool) -> Self {
        match raw {
            i64::MIN if with_sentinels => BucketKey::Underflow,
            i64::MAX if with_sentinels => BucketKey::Overflow,
            bin => BucketKey::Bin(bin),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Underflow => write!(f, "underflow"),
            BucketKey::Bin(bin) => write!(f, "{}", bin),
            BucketKey::Overflow => write!(f, "overflow"),
        }
    }
}

/// Binning configuration, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BinningMode {
    /// Unbounded buckets of width `interval`, shifted by `offset`.
    Interval { interval: f64, offset: f64 },
    /// `nbins` equal-width buckets over `[xmin, xmax]` plus under/overflow.
    FixedRange { nbins: i32, xmin: f64, xmax: f64 },
}

impl BinningMode {
    /// Build a validated interval mode.
    pub fn interval(interval: f64, offset: f64) -> Result<Self> {
        let mode = BinningMode::Interval { interval, offset };
        mode.validate()?;
        Ok(mode)
    }

    /// Build a validated fixed-range mode.
    pub fn fixed_range(nbins: i32, xmin: f64, xmax: f64) -> Result<Self> {
        let mode = BinningMode::FixedRange { nbins, xmin, xmax };
        mode.validate()?;
        Ok(mode)
    }

    /// Reject configurations that cannot produce a positive bucket width.
    pub fn validate(&self) -> Result<()> {
        match *self {
            BinningMode::Interval { interval, offset } => {
                if !(interval > 0.0) || !interval.is_finite() {
                    return Err(HistogramError::config(format!(
                        "[interval] must be greater than 0.0, got {}",
                        interval
                    )));
                }
                if !offset.is_finite() {
                    return Err(HistogramError::config(format!(
                        "[offset] must be finite, got {}",
                        offset
                    )));
                }
            }
            BinningMode::FixedRange { nbins, xmin, xmax } => {
                if nbins <= 0 {
                    return Err(HistogramError::config(format!(
                        "[nbin] must be greater than 0, got {}",
                        nbins
                    )));
                }
                if !xmin.is_finite() || !xmax.is_finite() {
                    return Err(HistogramError::config(format!(
                        "[xmin] and [xmax] must be finite, got [{}, {}]",
                        xmin, xmax
                    )));
                }
                if xmax <= xmin {
                    return Err(HistogramError::config(format!(
                        "[xmax] must be greater than [xmin], got [{}, {}]",
                        xmin, xmax
                    )));
                }
            }
        }
        Ok(())
    }

    /// Width of one ordinary bucket.
    pub fn bin_width(&self) -> f64 {
        match *self {
            BinningMode::Interval { interval, .. } => interval,
            BinningMode::FixedRange { nbins, xmin, xmax } => (xmax - xmin) / nbins as f64,
        }
    }

    /// Number of ordinary buckets, `0` for the unbounded interval mode.
    pub fn nbins(&self) -> i32 {
        match *self {
            BinningMode::Interval { .. } => 0,
            BinningMode::FixedRange { nbins, .. } => nbins,
        }
    }

    /// Whether this mode produces underflow/overflow buckets.
    pub fn has_sentinels(&self) -> bool {
        matches!(self, BinningMode::FixedRange { .. })
    }

    /// Position of an ordinary bucket: `key * width`, shifted by `xmin` in
    /// fixed-range mode. Used both as the reported `xLow` and as the bin
    /// position in the mean/rms computation.
    pub fn bin_position(&self, bin: i64) -> f64 {
        match *self {
            BinningMode::Interval { interval, .. } => bin as f64 * interval,
            BinningMode::FixedRange { xmin, .. } => bin as f64 * self.bin_width() + xmin,
        }
    }

    /// Bucket a single value. Prefer the specialised [`Binning`] types in loops.
    pub fn bucket(&self, value: f64) -> BucketKey {
        match *self {
            BinningMode::Interval { interval, offset } => {
                IntervalBinning { interval, offset }.bucket(value)
            }
            BinningMode::FixedRange { nbins, xmin, xmax } => {
                FixedRangeBinning::new_unchecked(nbins, xmin, xmax).bucket(value)
            }
        }
    }
}

impl fmt::Display for BinningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinningMode::Interval { interval, offset } => {
                write!(f, "interval(width={}, offset={})", interval, offset)
            }
            BinningMode::FixedRange { nbins, xmin, xmax } => {
                write!(f, "fixed_range(nbins={}, [{}, {}])", nbins, xmin, xmax)
            }
        }
    }
}

/// A concrete, pre-validated binning function.
pub trait Binning: Copy + Send + Sync + 'static {
    /// Map a value to its bucket.
    fn bucket(&self, value: f64) -> BucketKey;

    /// The configuration this binning was built from.
    fn mode(&self) -> BinningMode;
}

/// Interval binning: `floor((value + offset) / interval)`, no bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBinning {
    interval: f64,
    offset: f64,
}

impl IntervalBinning {
    pub fn new(interval: f64, offset: f64) -> Result<Self> {
        BinningMode::interval(interval, offset)?;
        Ok(Self { interval, offset })
    }
}

impl Binning for IntervalBinning {
    #[inline]
    fn bucket(&self, value: f64) -> BucketKey {
        BucketKey::Bin(((value + self.offset) / self.interval).floor() as i64)
    }

    fn mode(&self) -> BinningMode {
        BinningMode::Interval {
            interval: self.interval,
            offset: self.offset,
        }
    }
}

/// Fixed-range binning over `[xmin, xmax]`.
///
/// Both bounds are inclusive: `xmin` lands in bucket `0` and `xmax` in bucket
/// `nbins - 1`. Only values strictly outside the range reach a sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRangeBinning {
    nbins: i32,
    xmin: f64,
    xmax: f64,
    width: f64,
}

impl FixedRangeBinning {
    pub fn new(nbins: i32, xmin: f64, xmax: f64) -> Result<Self> {
        BinningMode::fixed_range(nbins, xmin, xmax)?;
        Ok(Self::new_unchecked(nbins, xmin, xmax))
    }

    fn new_unchecked(nbins: i32, xmin: f64, xmax: f64) -> Self {
        Self {
            nbins,
            xmin,
            xmax,
            width: (xmax - xmin) / nbins as f64,
        }
    }
}

impl Binning for FixedRangeBinning {
    #[inline]
    fn bucket(&self, value: f64) -> BucketKey {
        if value > self.xmax {
            BucketKey::Overflow
        } else if value < self.xmin {
            BucketKey::Underflow
        } else {
            // xmax itself, and values a rounding error below it, would land on
            // index nbins without the clamp.
            let bin = ((value - self.xmin) / self.width).floor() as i64;
            BucketKey::Bin(bin.min(self.nbins as i64 - 1))
        }
    }

    fn mode(&self) -> BinningMode {
        BinningMode::FixedRange {
            nbins: self.nbins,
            xmin: self.xmin,
            xmax: self.xmax,
        }
    }
}

impl Binning for BinningMode {
    fn bucket(&self, value: f64) -> BucketKey {
        BinningMode::bucket(self, value)
    }

    fn mode(&self) -> BinningMode {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_bucketing() {
        let binning = IntervalBinning::new(1.0, 0.0).unwrap();
        assert_eq!(binning.bucket(1.0), BucketKey::Bin(1));
        assert_eq!(binning.bucket(2.0), BucketKey::Bin(2));
        assert_eq!(binning.bucket(2.5), BucketKey::Bin(2));
        assert_eq!(binning.bucket(10.0), BucketKey::Bin(10));
        assert_eq!(binning.bucket(-0.5), BucketKey::Bin(-1));
    }

    #[test]
    fn test_interval_offset_and_fractional_width() {
        let binning = IntervalBinning::new(0.5, 0.25).unwrap();
        // (1.0 + 0.25) / 0.5 = 2.5
        assert_eq!(binning.bucket(1.0), BucketKey::Bin(2));
        // (-0.25 + 0.25) / 0.5 = 0
        assert_eq!(binning.bucket(-0.25), BucketKey::Bin(0));
        assert_eq!(binning.bucket(-0.3), BucketKey::Bin(-1));
    }

    #[test]
    fn test_fixed_range_edges() {
        let binning = FixedRangeBinning::new(2, 0.0, 4.0).unwrap();
        assert_eq!(binning.bucket(0.0), BucketKey::Bin(0));
        assert_eq!(binning.bucket(1.0), BucketKey::Bin(0));
        assert_eq!(binning.bucket(2.0), BucketKey::Bin(1));
        assert_eq!(binning.bucket(2.5), BucketKey::Bin(1));
        assert_eq!(binning.bucket(4.0), BucketKey::Bin(1));
        assert_eq!(binning.bucket(4.000001), BucketKey::Overflow);
        assert_eq!(binning.bucket(10.0), BucketKey::Overflow);
        assert_eq!(binning.bucket(-0.000001), BucketKey::Underflow);
    }

    #[test]
    fn test_fixed_range_upper_edge_with_rounding() {
        // 0.7 - 0.1 = 0.6 is not exactly representable; xmax must still land
        // in the last ordinary bucket.
        let binning = FixedRangeBinning::new(3, 0.1, 0.7).unwrap();
        assert_eq!(binning.bucket(0.7), BucketKey::Bin(2));
        assert_eq!(binning.bucket(0.1), BucketKey::Bin(0));
    }

    #[test]
    fn test_mode_dispatch_matches_specialised() {
        let mode = BinningMode::fixed_range(4, -1.0, 1.0).unwrap();
        let specialised = FixedRangeBinning::new(4, -1.0, 1.0).unwrap();
        for value in [-2.0, -1.0, -0.5, 0.0, 0.49, 0.5, 1.0, 1.5] {
            assert_eq!(Binning::bucket(&mode, value), specialised.bucket(value));
        }
        assert_eq!(specialised.mode(), mode);
    }

    #[test]
    fn test_validation() {
        assert!(BinningMode::interval(0.0, 0.0).is_err());
        assert!(BinningMode::interval(-1.0, 0.0).is_err());
        assert!(BinningMode::interval(f64::NAN, 0.0).is_err());
        assert!(BinningMode::interval(1.0, f64::INFINITY).is_err());
        assert!(BinningMode::fixed_range(0, 0.0, 1.0).is_err());
        assert!(BinningMode::fixed_range(-3, 0.0, 1.0).is_err());
        assert!(BinningMode::fixed_range(3, 1.0, 1.0).is_err());
        assert!(BinningMode::fixed_range(3, 1.0, -1.0).is_err());
        assert!(BinningMode::fixed_range(3, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_bin_geometry() {
        let fixed = BinningMode::fixed_range(4, 10.0, 20.0).unwrap();
        assert_eq!(fixed.bin_width(), 2.5);
        assert_eq!(fixed.nbins(), 4);
        assert_eq!(fixed.bin_position(2), 15.0);
        assert!(fixed.has_sentinels());

        let interval = BinningMode::interval(0.5, 3.0).unwrap();
        assert_eq!(interval.bin_width(), 0.5);
        assert_eq!(interval.nbins(), 0);
        assert_eq!(interval.bin_position(4), 2.0);
        assert!(!interval.has_sentinels());
    }

    #[test]
    fn test_bucket_key_order_and_wire_form() {
        let mut keys = vec![
            BucketKey::Overflow,
            BucketKey::Bin(3),
            BucketKey::Underflow,
            BucketKey::Bin(-7),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                BucketKey::Underflow,
                BucketKey::Bin(-7),
                BucketKey::Bin(3),
                BucketKey::Overflow
            ]
        );

        assert_eq!(BucketKey::Underflow.to_wire(), i64::MIN);
        assert_eq!(BucketKey::Overflow.to_wire(), i64::MAX);
        assert_eq!(BucketKey::from_wire(i64::MAX, true), BucketKey::Overflow);
        assert_eq!(BucketKey::from_wire(i64::MAX, false), BucketKey::Bin(i64::MAX));
        assert_eq!(BucketKey::from_wire(5, true), BucketKey::Bin(5));
    }
}
