use crate::accumulator::BucketEntry;
use crate::error::{CodecError, HistogramError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Presentation order of the final entry list.
///
/// Ordering never influences merging; it is applied once, after the reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    /// Ascending bucket key, underflow first and overflow last.
    #[default]
    Key,
    #[serde(alias = "reverseKey")]
    ReverseKey,
    /// Descending document count, ties broken by ascending key.
    Count,
    #[serde(alias = "reverseCount")]
    ReverseCount,
    /// Descending bin content (sum of weights), ties broken by ascending key.
    Total,
    #[serde(alias = "reverseTotal")]
    ReverseTotal,
}

impl OrderPolicy {
    /// Stable identifier used in the wire frame. `key`, `count` and `total`
    /// keep the legacy comparator ids 0, 1 and 2; the reverse policies follow.
    pub fn id(self) -> u8 {
        match self {
            OrderPolicy::Key => 0,
            OrderPolicy::Count => 1,
            OrderPolicy::Total => 2,
            OrderPolicy::ReverseKey => 3,
            OrderPolicy::ReverseCount => 4,
            OrderPolicy::ReverseTotal => 5,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, CodecError> {
        Ok(match id {
            0 => OrderPolicy::Key,
            1 => OrderPolicy::Count,
            2 => OrderPolicy::Total,
            3 => OrderPolicy::ReverseKey,
            4 => OrderPolicy::ReverseCount,
            5 => OrderPolicy::ReverseTotal,
            other => return Err(CodecError::UnknownOrderPolicy(other)),
        })
    }

    /// Total order over entries under this policy.
    pub fn compare(self, a: &BucketEntry, b: &BucketEntry) -> Ordering {
        match self {
            OrderPolicy::Key => a.key.cmp(&b.key),
            OrderPolicy::Count => b.count().cmp(&a.count()).then_with(|| a.key.cmp(&b.key)),
            OrderPolicy::Total => b.sum().total_cmp(&a.sum()).then_with(|| a.key.cmp(&b.key)),
            OrderPolicy::ReverseKey => OrderPolicy::Key.compare(b, a),
            OrderPolicy::ReverseCount => OrderPolicy::Count.compare(b, a),
            OrderPolicy::ReverseTotal => OrderPolicy::Total.compare(b, a),
        }
    }

    /// Sort `entries` in place.
    pub fn sort(self, entries: &mut [BucketEntry]) {
        entries.sort_unstable_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for OrderPolicy {
    type Err = HistogramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(OrderPolicy::Key),
            "reverse_key" | "reverseKey" => Ok(OrderPolicy::ReverseKey),
            "count" => Ok(OrderPolicy::Count),
            "reverse_count" | "reverseCount" => Ok(OrderPolicy::ReverseCount),
            "total" => Ok(OrderPolicy::Total),
            "reverse_total" | "reverseTotal" => Ok(OrderPolicy::ReverseTotal),
            other => Err(HistogramError::config(format!(
                "no order policy found for [{}]",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderPolicy::Key => "key",
            OrderPolicy::ReverseKey => "reverse_key",
            OrderPolicy::Count => "count",
            OrderPolicy::ReverseCount => "reverse_count",
            OrderPolicy::Total => "total",
            OrderPolicy::ReverseTotal => "reverse_total",
        };
        write!(f, "{}", name)
    }
}
