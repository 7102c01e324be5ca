//! Error types for the Talos supervisor.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures produced while constructing, running, or invoking a function
/// server.
///
/// Every invocation failure maps to exactly one variant; nothing is retried
/// or reclassified internally.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid constructor input (port below the allowed range, empty
    /// command).
    #[error("Illegal argument: {message}")]
    IllegalArgument {
        /// Error message.
        message: String,
    },

    /// The invocation request itself is malformed.
    #[error("Invalid request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// The deadline passed before dispatch, or the transport timed out
    /// during the call.
    #[error("{message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// The loopback connection to the function server was refused.
    #[error("The local function server at {address} refused the connection")]
    ConnectionRefused {
        /// Target address of the refused connection.
        address: String,
    },

    /// Any other transport-level failure.
    #[error("Unknown system error: {message}")]
    UnknownSystem {
        /// Error message.
        message: String,
    },

    /// The function server answered with HTTP status >= 400.
    #[error("The function server returned an error: {error}")]
    FunctionServer {
        /// Decoded structured error from the response body.
        error: ApiError,
    },

    /// The function server answered with a success status but an
    /// undecodable body.
    #[error("Unable to decode response payload: {message}")]
    InvalidResponsePayload {
        /// Error message.
        message: String,
    },

    /// Process-level failure, propagated from the execution environment
    /// without reclassification.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metrics report failed after the invocation itself succeeded.
    #[error("Metrics error: {0}")]
    Metrics(#[from] talos_metrics::MetricsError),
}

impl ServerError {
    /// Create an illegal-argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Create a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a connection-refused error.
    pub fn connection_refused(address: impl Into<String>) -> Self {
        Self::ConnectionRefused {
            address: address.into(),
        }
    }

    /// Create an unknown-system error.
    pub fn unknown_system(message: impl Into<String>) -> Self {
        Self::UnknownSystem {
            message: message.into(),
        }
    }

    /// Create an invalid-response-payload error.
    pub fn invalid_response_payload(message: impl Into<String>) -> Self {
        Self::InvalidResponsePayload {
            message: message.into(),
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::IllegalArgument { .. } => "illegal-argument",
            Self::BadRequest { .. } => "bad-request",
            Self::Timeout { .. } => "timeout",
            Self::ConnectionRefused { .. } => "connection-refused",
            Self::UnknownSystem { .. } => "unknown-system-error",
            Self::FunctionServer { .. } => "function-server-error",
            Self::InvalidResponsePayload { .. } => "invalid-response-payload",
            Self::Io(_) => "io",
            Self::Metrics(_) => "metrics",
        }
    }
}

/// Result type for supervisor operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Structured error value returned by a function server with a status
/// >= 400 response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Name of the function that failed, when the server reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ServerError::illegal_argument("port 80");
        assert_eq!(err.category(), "illegal-argument");
        assert!(err.to_string().contains("port 80"));

        let err = ServerError::connection_refused("http://127.0.0.1:9000");
        assert_eq!(err.category(), "connection-refused");
        assert!(err.to_string().contains("http://127.0.0.1:9000"));

        let err = ServerError::timeout("deadline exceeded");
        assert_eq!(err.to_string(), "deadline exceeded");
    }

    #[test]
    fn test_api_error_decode() {
        let err: ApiError =
            serde_json::from_str(r#"{"code":500,"message":"boom","functionName":"hello"}"#)
                .unwrap();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "boom");
        assert_eq!(err.function_name.as_deref(), Some("hello"));
        assert_eq!(err.to_string(), "[500] boom");
    }

    #[test]
    fn test_api_error_decode_unknown_shape() {
        // An error body the server did not structure still decodes, field by
        // field, into the default value.
        let err: ApiError = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(err, ApiError::default());
    }

    #[test]
    fn test_function_server_display() {
        let err = ServerError::FunctionServer {
            error: ApiError {
                code: 502,
                message: "upstream exploded".to_string(),
                function_name: None,
            },
        };
        assert!(err.to_string().contains("[502] upstream exploded"));
    }
}
