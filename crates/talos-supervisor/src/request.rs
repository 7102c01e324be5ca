//! The invocation request envelope.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ServerError, ServerResult};

/// One invocation request: a context mapping plus arbitrary application
/// fields, serialized as a single JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Invocation context.
    #[serde(default)]
    pub context: RequestContext,
    /// Application payload fields, kept at the top level of the envelope.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl InvokeRequest {
    /// Create a request with the given payload and an empty context.
    pub fn new(payload: Map<String, Value>) -> Self {
        Self {
            context: RequestContext::default(),
            payload,
        }
    }

    /// Set the context.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Typed invocation context.
///
/// The recognized keys are named fields; everything else the caller put in
/// the context survives in `extra` and round-trips through serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Absolute RFC3339 deadline for the invocation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    /// Metrics sink for this invocation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_dst: Option<MetricsDestination>,
    /// Unrecognized context keys, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    /// Parse the deadline field, when present, as an RFC3339 timestamp.
    ///
    /// A present but unparseable deadline is a bad request.
    pub fn deadline(&self) -> ServerResult<Option<DateTime<FixedOffset>>> {
        match &self.deadline {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw).map(Some).map_err(|e| {
                ServerError::bad_request(format!("unable to parse deadline: {e}"))
            }),
        }
    }

    /// Set the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = Some(deadline.into());
        self
    }

    /// Set the metrics destination.
    #[must_use]
    pub fn with_metrics_dst(mut self, dst: MetricsDestination) -> Self {
        self.metrics_dst = Some(dst);
        self
    }
}

/// Description of a metrics sink carried in the invocation context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsDestination {
    /// Sink type, e.g. `wavefront`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ingestion endpoint URL.
    #[serde(default)]
    pub url: String,
    /// API token for the endpoint.
    #[serde(default)]
    pub token: String,
}
