//! The metrics capability interface consumed by the supervisor.

use async_trait::async_trait;

use crate::error::MetricsResult;
use crate::metric::{MetricSpec, MetricValue};

/// A pluggable counter/gauge sink.
///
/// Implementations own their metric registry: `register` declares the
/// metrics a caller intends to update, `update` applies typed values to
/// them, and `report` flushes everything registered to the backend in one
/// synchronous round trip.
#[async_trait]
pub trait MetricsClient: Send {
    /// Register a set of metrics with this client.
    ///
    /// Registration is idempotent per name.
    fn register(&mut self, specs: Vec<MetricSpec>);

    /// Apply a value to a registered metric.
    ///
    /// Fails if the name was never registered or if the value does not
    /// match the metric's registered kind.
    fn update(&mut self, name: &str, value: MetricValue) -> MetricsResult<()>;

    /// Flush all registered metrics to the backend.
    async fn report(&mut self) -> MetricsResult<()>;
}
