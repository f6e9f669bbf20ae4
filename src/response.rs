//! JSON response representation of a reduced histogram.
//!
//! Field names follow the facet response format consumed by existing
//! clients (`binsize`, `nbin`, `xLow`, `binContent`, ...). In fixed-range mode
//! the underflow and overflow buckets are reported only through the
//! `underflows` / `overflows` totals, never as entries.

use crate::binning::BucketKey;
use crate::histogram::HistogramResult;
use serde::{Deserialize, Serialize};

/// Response type tag.
pub const RESPONSE_TYPE: &str = "decimal_histogram";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramResponse {
    #[serde(rename = "_type")]
    pub kind: String,
    pub binsize: f64,
    pub nbin: i32,
    pub integral: f64,
    /// `None` (JSON `null`) when the histogram holds no weight.
    pub mean: Option<f64>,
    pub rms: Option<f64>,
    pub underflows: f64,
    pub overflows: f64,
    pub entries: Vec<ResponseEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub bin: i64,
    #[serde(rename = "xLow")]
    pub x_low: f64,
    pub count: u64,
    #[serde(rename = "binContent")]
    pub bin_content: f64,
    /// `sqrt(sum_of_squares)`
    pub error: f64,
}

fn non_nan(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl From<&HistogramResult> for HistogramResponse {
    fn from(histogram: &HistogramResult) -> Self {
        let mode = histogram.mode();
        let entries = histogram
            .entries()
            .iter()
            .filter_map(|entry| match entry.key {
                BucketKey::Bin(bin) => Some(ResponseEntry {
                    bin,
                    x_low: mode.bin_position(bin),
                    count: entry.count(),
                    bin_content: entry.sum(),
                    error: entry.stats.error(),
                }),
                _ => None,
            })
            .collect();

        Self {
            kind: RESPONSE_TYPE.to_string(),
            binsize: mode.bin_width(),
            nbin: mode.nbins(),
            integral: histogram.integral(),
            mean: non_nan(histogram.mean()),
            rms: non_nan(histogram.rms()),
            underflows: histogram.underflow(),
            overflows: histogram.overflow(),
            entries,
        }
    }
}

impl From<HistogramResult> for HistogramResponse {
    fn from(histogram: HistogramResult) -> Self {
        HistogramResponse::from(&histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::BucketEntry;
    use crate::binning::BinningMode;
    use crate::order::OrderPolicy;
    use serde_json::json;

    #[test]
    fn test_fixed_range_response_omits_sentinels() {
        let mode = BinningMode::fixed_range(2, 0.0, 4.0).unwrap();
        let histogram = HistogramResult::from_entries(
            mode,
            OrderPolicy::Key,
            vec![
                BucketEntry::new(BucketKey::Underflow, 0, 0.0, 0.0),
                BucketEntry::new(BucketKey::Bin(0), 1, 1.0, 1.0),
                BucketEntry::new(BucketKey::Bin(1), 2, 4.5, 10.25),
                BucketEntry::new(BucketKey::Overflow, 1, 10.0, 100.0),
            ],
        );
        let response = HistogramResponse::from(&histogram);

        assert_eq!(response.kind, RESPONSE_TYPE);
        assert_eq!(response.binsize, 2.0);
        assert_eq!(response.nbin, 2);
        assert_eq!(response.overflows, 10.0);
        assert_eq!(response.entries.len(), 2);
        assert_eq!(response.entries[1].x_low, 2.0);
        assert_eq!(response.entries[1].error, 10.25f64.sqrt());
    }

    #[test]
    fn test_json_field_names() {
        let mode = BinningMode::interval(0.5, 0.0).unwrap();
        let histogram = HistogramResult::from_entries(
            mode,
            OrderPolicy::Key,
            vec![BucketEntry::new(BucketKey::Bin(3), 1, 1.5, 2.25)],
        );
        let value = serde_json::to_value(HistogramResponse::from(histogram)).unwrap();

        assert_eq!(value["_type"], json!("decimal_histogram"));
        assert_eq!(value["nbin"], json!(0));
        assert_eq!(
            value["entries"][0],
            json!({"bin": 3, "xLow": 1.5, "count": 1, "binContent": 1.5, "error": 1.5})
        );
    }

    #[test]
    fn test_no_data_serialises_null_statistics() {
        let mode = BinningMode::interval(1.0, 0.0).unwrap();
        let histogram = HistogramResult::from_entries(mode, OrderPolicy::Key, Vec::new());
        let value = serde_json::to_value(HistogramResponse::from(histogram)).unwrap();
        assert!(value["mean"].is_null());
        assert!(value["rms"].is_null());
        assert_eq!(value["integral"], json!(0.0));
        assert_eq!(value["entries"], json!([]));
    }

    #[test]
    fn test_only_nan_is_undefined() {
        assert_eq!(non_nan(f64::NAN), None);
        assert_eq!(non_nan(f64::INFINITY), Some(f64::INFINITY));
        assert_eq!(non_nan(-0.5), Some(-0.5));
    }
}
