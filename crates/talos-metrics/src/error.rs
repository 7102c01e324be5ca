//! Error types for metrics clients.

use thiserror::Error;

use crate::metric::MetricKind;

/// Errors produced by metrics registries and clients.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric was updated without being registered first.
    #[error("Metric {name} is not registered with this client")]
    NotRegistered {
        /// Name the update was addressed to.
        name: String,
    },

    /// A metric was updated with a value of the wrong numeric kind.
    #[error("Metric {name} expects a {expected} value")]
    KindMismatch {
        /// Name of the metric.
        name: String,
        /// The kind the metric was registered with.
        expected: MetricKind,
    },

    /// The backend rejected a report.
    #[error("Metrics report failed: {message}")]
    Report {
        /// Error message.
        message: String,
    },

    /// Transport-level failure talking to the backend.
    #[error("Metrics transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl MetricsError {
    /// Create a not-registered error.
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::NotRegistered { name: name.into() }
    }

    /// Create a kind-mismatch error.
    pub fn kind_mismatch(name: impl Into<String>, expected: MetricKind) -> Self {
        Self::KindMismatch {
            name: name.into(),
            expected,
        }
    }

    /// Create a report error.
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }
}

/// Result type for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;
