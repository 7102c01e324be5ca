//! Wavefront direct-ingestion adapter.

use async_trait::async_trait;
use tracing::debug;

use crate::client::MetricsClient;
use crate::error::{MetricsError, MetricsResult};
use crate::metric::{MetricRegistry, MetricSpec, MetricValue};

/// Metrics client reporting to a Wavefront direct-ingestion endpoint.
#[derive(Debug)]
pub struct WavefrontClient {
    url: String,
    token: String,
    source: String,
    registry: MetricRegistry,
    http: reqwest::Client,
}

impl WavefrontClient {
    /// Create a client for the given cluster URL and API token.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            source: "talos".to_string(),
            registry: MetricRegistry::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Set the `source` tag attached to every reported point.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Render the registry in Wavefront data format, one point per line:
    /// `<series> <value> <epoch-seconds> source=<source>`.
    fn render(&self, timestamp: i64) -> String {
        let mut body = String::new();
        for sample in self.registry.samples() {
            let value = match sample.value {
                MetricValue::Count(count) => count.to_string(),
                MetricValue::Gauge(gauge) => gauge.to_string(),
            };
            body.push_str(&format!(
                "{} {} {} source={}\n",
                sample.series, value, timestamp, self.source
            ));
        }
        body
    }
}

#[async_trait]
impl MetricsClient for WavefrontClient {
    fn register(&mut self, specs: Vec<MetricSpec>) {
        self.registry.register(specs);
    }

    fn update(&mut self, name: &str, value: MetricValue) -> MetricsResult<()> {
        self.registry.update(name, value)
    }

    async fn report(&mut self) -> MetricsResult<()> {
        let body = self.render(chrono::Utc::now().timestamp());
        if body.is_empty() {
            return Ok(());
        }

        debug!(url = %self.url, points = body.lines().count(), "reporting metrics");

        let response = self
            .http
            .post(format!("{}/report", self.url))
            .bearer_auth(&self.token)
            .header("content-type", "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::report(format!(
                "wavefront ingestion returned {status}"
            )));
        }

        Ok(())
    }
}
