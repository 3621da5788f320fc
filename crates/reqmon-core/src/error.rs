//! Shared error type across reqmon crates.

use thiserror::Error;

use crate::metrics::MetricKind;

/// Stable error codes (safe to log, match on, or expose to operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A metric with the same name is already registered.
    DuplicateMetricName,
    /// Metric name was empty.
    EmptyMetricName,
    /// Metric kind has no backend constructor.
    UnsupportedMetricKind,
    /// Histogram registered without buckets.
    MissingHistogramBuckets,
    /// Summary registered without objectives.
    MissingSummaryObjectives,
    /// Operation on a metric that was never registered.
    MetricNotRegistered,
    /// Operation does not fit the metric kind.
    MetricKindMismatch,
    /// Backend rejected the metric definition or the update.
    InvalidMetric,
    /// Bloom filter capacity is not a power of two.
    InvalidCapacity,
    /// Configuration could not be parsed or failed validation.
    BadConfig,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateMetricName => "DUPLICATE_METRIC_NAME",
            ErrorCode::EmptyMetricName => "EMPTY_METRIC_NAME",
            ErrorCode::UnsupportedMetricKind => "UNSUPPORTED_METRIC_KIND",
            ErrorCode::MissingHistogramBuckets => "MISSING_HISTOGRAM_BUCKETS",
            ErrorCode::MissingSummaryObjectives => "MISSING_SUMMARY_OBJECTIVES",
            ErrorCode::MetricNotRegistered => "METRIC_NOT_REGISTERED",
            ErrorCode::MetricKindMismatch => "METRIC_KIND_MISMATCH",
            ErrorCode::InvalidMetric => "INVALID_METRIC",
            ErrorCode::InvalidCapacity => "INVALID_CAPACITY",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ReqmonError>;

/// Unified error type used by core and the HTTP adapter.
#[derive(Debug, Error)]
pub enum ReqmonError {
    #[error("metric '{0}' is already registered")]
    DuplicateMetricName(String),
    #[error("metric name cannot be empty")]
    EmptyMetricName,
    #[error("metric kind '{0}' is not supported")]
    UnsupportedMetricKind(MetricKind),
    #[error("metric '{0}' is a histogram and needs at least one bucket")]
    MissingHistogramBuckets(String),
    #[error("metric '{0}' is a summary and needs at least one objective")]
    MissingSummaryObjectives(String),
    #[error("metric '{0}' is not registered")]
    MetricNotRegistered(String),
    #[error("metric '{name}' is a {kind}, cannot {op}")]
    MetricKindMismatch {
        name: String,
        kind: MetricKind,
        op: &'static str,
    },
    #[error("invalid metric: {0}")]
    InvalidMetric(String),
    #[error("bloom filter capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ReqmonError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReqmonError::DuplicateMetricName(_) => ErrorCode::DuplicateMetricName,
            ReqmonError::EmptyMetricName => ErrorCode::EmptyMetricName,
            ReqmonError::UnsupportedMetricKind(_) => ErrorCode::UnsupportedMetricKind,
            ReqmonError::MissingHistogramBuckets(_) => ErrorCode::MissingHistogramBuckets,
            ReqmonError::MissingSummaryObjectives(_) => ErrorCode::MissingSummaryObjectives,
            ReqmonError::MetricNotRegistered(_) => ErrorCode::MetricNotRegistered,
            ReqmonError::MetricKindMismatch { .. } => ErrorCode::MetricKindMismatch,
            ReqmonError::InvalidMetric(_) => ErrorCode::InvalidMetric,
            ReqmonError::InvalidCapacity(_) => ErrorCode::InvalidCapacity,
            ReqmonError::BadConfig(_) => ErrorCode::BadConfig,
            ReqmonError::Internal(_) => ErrorCode::Internal,
        }
    }
}
