//! Metric definitions and the per-client registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

/// Numeric kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically accumulating integer count.
    Counter,
    /// Last-value floating point measurement.
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
        }
    }
}

/// Definition of a single metric.
///
/// `name` is the key updates are addressed to; `series` is the name the
/// backend stores the data under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    /// Registry key, e.g. `invocation`.
    pub name: String,
    /// Backend series name, e.g. `talos.function.invocation`.
    pub series: String,
    /// Numeric kind.
    pub kind: MetricKind,
}

impl MetricSpec {
    /// Define a counter.
    pub fn counter(name: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: series.into(),
            kind: MetricKind::Counter,
        }
    }

    /// Define a gauge.
    pub fn gauge(name: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: series.into(),
            kind: MetricKind::Gauge,
        }
    }
}

/// A typed metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Increment for a counter.
    Count(i64),
    /// New value for a gauge.
    Gauge(f64),
}

impl MetricValue {
    /// The kind of metric this value applies to.
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Count(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
        }
    }
}

/// A reportable observation: the backend series name plus its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Backend series name.
    pub series: String,
    /// Current value.
    pub value: MetricValue,
}

/// Client-owned registry of named metrics.
///
/// Registration is idempotent per name; updates validate both that the name
/// is registered and that the value matches the registered kind. Counters
/// accumulate across updates, gauges keep the last value. Metrics that were
/// never updated are excluded from report snapshots.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, Registered>,
}

#[derive(Debug)]
struct Registered {
    spec: MetricSpec,
    value: MetricValue,
    updated: bool,
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set of metrics, initializing counters to 0 and gauges to
    /// 0.0. Names already present keep their spec and accumulated value.
    pub fn register(&mut self, specs: Vec<MetricSpec>) {
        for spec in specs {
            if self.metrics.contains_key(&spec.name) {
                tracing::debug!(name = %spec.name, "metric already registered");
                continue;
            }
            let value = match spec.kind {
                MetricKind::Counter => MetricValue::Count(0),
                MetricKind::Gauge => MetricValue::Gauge(0.0),
            };
            self.metrics.insert(
                spec.name.clone(),
                Registered {
                    spec,
                    value,
                    updated: false,
                },
            );
        }
    }

    /// Apply a value to a registered metric.
    pub fn update(&mut self, name: &str, value: MetricValue) -> MetricsResult<()> {
        let registered = self
            .metrics
            .get_mut(name)
            .ok_or_else(|| MetricsError::not_registered(name))?;

        match (registered.value, value) {
            (MetricValue::Count(current), MetricValue::Count(delta)) => {
                registered.value = MetricValue::Count(current + delta);
            }
            (MetricValue::Gauge(_), MetricValue::Gauge(new)) => {
                registered.value = MetricValue::Gauge(new);
            }
            _ => return Err(MetricsError::kind_mismatch(name, registered.spec.kind)),
        }

        registered.updated = true;
        Ok(())
    }

    /// Snapshot the current values of every metric updated since
    /// registration. Untouched metrics are omitted.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.metrics
            .values()
            .filter(|registered| registered.updated)
            .map(|registered| MetricSample {
                series: registered.spec.series.clone(),
                value: registered.value,
            })
            .collect()
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
