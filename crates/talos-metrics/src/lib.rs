//! Talos metrics - pluggable invocation metrics sinks
//!
//! This crate defines the capability interface the Talos supervisor uses to
//! publish per-invocation metrics, together with the thin vendor adapters
//! that satisfy it. The supervisor only ever talks to the [`MetricsClient`]
//! trait; which backend receives the data is decided per invocation from the
//! request context.
//!
//! Every client owns its own [`MetricRegistry`]: metrics are registered by
//! name, updated with typed values, and flushed to the backend in a single
//! `report` call. There is no process-global registry, so two clients never
//! observe each other's values.
//!
//! # Example
//!
//! ```rust,ignore
//! use talos_metrics::{MetricSpec, MetricValue, MetricsClient, WavefrontClient};
//!
//! let mut client = WavefrontClient::new("https://metrics.example.com", "token");
//! client.register(vec![MetricSpec::counter("invocation", "talos.function.invocation")]);
//! client.update("invocation", MetricValue::Count(1))?;
//! client.report().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/talos-metrics/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod metric;
pub mod wavefront;

pub use client::MetricsClient;
pub use error::{MetricsError, MetricsResult};
pub use metric::{MetricKind, MetricRegistry, MetricSample, MetricSpec, MetricValue};
pub use wavefront::WavefrontClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports() {
        // Verify all public types are accessible
        let _registry = MetricRegistry::new();
    }
}
