//! # Error Taxonomy
//!
//! Every failure the aggregation core can report. Configuration problems are
//! caught before any document is collected, evaluation failures abort the
//! partition that hit them, and pool exhaustion only affects the partition
//! that could not obtain storage.

use crate::source::DocId;
use thiserror::Error;

/// Boxed error type returned by externally supplied expression evaluators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the library.
pub type Result<T, E = HistogramError> = std::result::Result<T, E>;

/// Errors raised while configuring, collecting, reducing or transporting a histogram.
#[derive(Debug, Error)]
pub enum HistogramError {
    /// The request is invalid and was rejected before collection started.
    #[error("invalid histogram configuration: {0}")]
    Config(String),

    /// A key or value expression failed for a single document.
    #[error("expression evaluation failed for document {doc}: {source}")]
    Evaluation {
        doc: DocId,
        #[source]
        source: BoxError,
    },

    /// No accumulator storage could be leased for a partition.
    #[error("accumulator pool exhausted ({limit} leases outstanding)")]
    PoolExhausted { limit: usize },

    /// A partial result was produced under a different binning mode.
    #[error("cannot merge histograms with incompatible binning: expected {expected}, found {found}")]
    IncompatibleBinning { expected: String, found: String },

    /// The reducer was handed no partial results at all.
    #[error("cannot reduce an empty set of partial results")]
    EmptyReduce,

    /// `collect` was called before a document source was bound.
    #[error("collector has no document source bound")]
    NoSource,

    /// A wire frame could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl HistogramError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        HistogramError::Config(msg.into())
    }
}

/// Errors raised while decoding a wire frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("varint at offset {offset} does not fit in {bits} bits")]
    VarintOverflow { offset: usize, bits: u32 },

    #[error("unknown order policy id {0}")]
    UnknownOrderPolicy(u8),

    #[error("invalid bin count {0}")]
    InvalidBinCount(i32),

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("invalid binning mode in frame: {0}")]
    InvalidMode(String),

    #[error("bucket key {0} appears more than once in frame")]
    DuplicateKey(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HistogramError::config("[interval] must be greater than 0.0");
        assert_eq!(
            err.to_string(),
            "invalid histogram configuration: [interval] must be greater than 0.0"
        );

        let err = HistogramError::PoolExhausted { limit: 4 };
        assert_eq!(
            err.to_string(),
            "accumulator pool exhausted (4 leases outstanding)"
        );

        let err: HistogramError = CodecError::UnknownOrderPolicy(9).into();
        assert_eq!(err.to_string(), "unknown order policy id 9");

        let err: HistogramError = CodecError::DuplicateKey(2).into();
        assert_eq!(err.to_string(), "bucket key 2 appears more than once in frame");
    }

    #[test]
    fn test_evaluation_error_keeps_source() {
        use std::error::Error as _;

        let err = HistogramError::Evaluation {
            doc: 7,
            source: "division by zero".into(),
        };
        assert!(err.to_string().contains("document 7"));
        assert_eq!(err.source().unwrap().to_string(), "division by zero");
    }
}
