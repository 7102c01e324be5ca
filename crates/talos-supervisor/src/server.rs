//! Function server lifecycle and invocation proxying.
//!
//! A [`Server`] owns exactly one function process for its entire lifetime:
//! it spawns the process with `PORT` injected into the environment, captures
//! the process's stdout/stderr into generation-stamped buffers, forwards
//! invocation requests to the loopback HTTP endpoint the process exposes,
//! and classifies every failure into the [`ServerError`] taxonomy.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use talos_metrics::{MetricSpec, MetricValue, MetricsClient, WavefrontClient};

use crate::capture::{capture_lines, LogBuffer, LogSnapshot};
use crate::config::SupervisorConfig;
use crate::error::{ApiError, ServerError, ServerResult};
use crate::request::{InvokeRequest, MetricsDestination};

/// Lowest port a function server may be bound to.
pub const MIN_PORT: u16 = 1024;

const METRIC_INVOCATION: &str = "invocation";
const METRIC_TIMEOUT: &str = "timeout";
const METRIC_CONNECTION_REFUSED: &str = "connection-refused";
const METRIC_UNKNOWN_SYSTEM_ERROR: &str = "unknown-system-error";
const METRIC_DURATION: &str = "duration";

/// Factory producing unstarted [`Server`] instances bound to a preconfigured
/// command line.
#[derive(Debug, Clone)]
pub struct ServerFactory {
    program: String,
    args: Vec<String>,
}

impl ServerFactory {
    /// Create a factory from a whitespace-separated command line.
    ///
    /// The first field is the program, the rest its arguments. An empty
    /// command is an illegal argument.
    pub fn new(command: &str) -> ServerResult<Self> {
        let mut fields = command.split_whitespace().map(String::from);
        let Some(program) = fields.next() else {
            return Err(ServerError::illegal_argument("server command is empty"));
        };

        Ok(Self {
            program,
            args: fields.collect(),
        })
    }

    /// Create a factory from the supervisor configuration.
    pub fn from_config(config: &SupervisorConfig) -> ServerResult<Self> {
        Self::new(&config.server.command)
    }

    /// Produce an unstarted server bound to `port`, with `PORT=<port>`
    /// injected into the child environment.
    pub fn create_server(&self, port: u16) -> ServerResult<Server> {
        Server::new(port, &self.program, self.args.clone())
    }
}

/// One function process and the invocation protocol against it.
///
/// A server supports at most one in-flight [`invoke`](Server::invoke) at a
/// time. Concurrent invokes are memory-safe but interleave the per-invocation
/// log buffer resets; the generation numbers on
/// [`stdout_snapshot`](Server::stdout_snapshot) make such interleavings
/// observable.
#[derive(Debug)]
pub struct Server {
    port: u16,
    command: Command,
    child: Option<Child>,
    client: Client,
    stdout: LogBuffer,
    stderr: LogBuffer,
}

impl Server {
    /// Create an unstarted server for the given port and command.
    ///
    /// Ports below [`MIN_PORT`] never produce a server. All environment
    /// variables of the supervisor are inherited by the child, plus
    /// `PORT=<port>`.
    pub fn new(port: u16, program: &str, args: Vec<String>) -> ServerResult<Self> {
        if port < MIN_PORT {
            return Err(ServerError::illegal_argument(format!(
                "port {port} is below the allowed minimum {MIN_PORT}"
            )));
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .env("PORT", port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let client = Client::builder()
            .build()
            .map_err(|e| ServerError::unknown_system(format!("failed to create http client: {e}")))?;

        Ok(Self {
            port,
            command,
            child: None,
            client,
            stdout: LogBuffer::new(),
            stderr: LogBuffer::new(),
        })
    }

    /// The port this server's function process is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Spawn the function process and launch the two capture tasks.
    ///
    /// Returns as soon as the spawn succeeds or fails; readiness of the
    /// process's HTTP endpoint is the caller's concern. Must be called from
    /// within a Tokio runtime.
    pub fn start(&mut self) -> ServerResult<()> {
        if self.child.is_some() {
            return Err(ServerError::illegal_argument(
                "server has already been started",
            ));
        }

        let mut child = self.command.spawn()?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(capture_lines(stdout, self.stdout.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(capture_lines(stderr, self.stderr.clone()));
        }

        info!(port = self.port, pid = child.id(), "function process started");
        self.child = Some(child);
        Ok(())
    }

    /// Forward one invocation to the function process.
    ///
    /// The request envelope is serialized to JSON and POSTed to the loopback
    /// endpoint, bounded by the remaining time until the context deadline
    /// (unbounded when no deadline is given). A deadline that has already
    /// passed, or fails to parse, aborts the call before any network
    /// attempt. The previous invocation's captured output is discarded
    /// before dispatch.
    ///
    /// When the context names a recognized metrics destination, a metrics
    /// client scoped to this call counts the invocation and its failure
    /// class and reports synchronously before returning; a report failure
    /// after a functionally successful invocation becomes the call's error.
    pub async fn invoke(&self, request: &InvokeRequest) -> ServerResult<Value> {
        let timeout = remaining_time(request)?;

        let mut metrics = build_metrics_client(request.context.metrics_dst.as_ref());
        if let Some(client) = metrics.as_deref_mut() {
            client.register(invocation_metrics());
            update_best_effort(client, METRIC_INVOCATION, MetricValue::Count(1));
        }

        self.stdout.reset();
        self.stderr.reset();

        let url = format!("http://127.0.0.1:{}", self.port);
        let mut outbound = self.client.post(&url).json(request);
        if let Some(timeout) = timeout {
            outbound = outbound.timeout(timeout);
        }

        debug!(url = %url, timeout = ?timeout, "dispatching invocation");

        let started = Instant::now();
        let response = match outbound.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = classify_transport_error(&url, &e);
                if let Some(client) = metrics.as_deref_mut() {
                    update_best_effort(client, error_metric(&err), MetricValue::Count(1));
                    report_best_effort(client).await;
                }
                return Err(err);
            }
        };

        if let Some(client) = metrics.as_deref_mut() {
            update_best_effort(
                client,
                METRIC_DURATION,
                MetricValue::Gauge(started.elapsed().as_secs_f64()),
            );
        }

        let status = response.status();
        if status.as_u16() >= 400 {
            // A transport round trip that succeeded but a function that
            // failed; not counted as a system error.
            let error = response
                .bytes()
                .await
                .ok()
                .and_then(|body| serde_json::from_slice::<ApiError>(&body).ok())
                .unwrap_or_default();
            if let Some(client) = metrics.as_deref_mut() {
                report_best_effort(client).await;
            }
            return Err(ServerError::FunctionServer { error });
        }

        let result = match decode_response(response).await {
            Ok(value) => value,
            Err(e) => {
                if let Some(client) = metrics.as_deref_mut() {
                    report_best_effort(client).await;
                }
                return Err(e);
            }
        };

        if let Some(client) = metrics.as_deref_mut() {
            client.report().await?;
        }

        Ok(result)
    }

    /// Lines captured from the process's standard output so far.
    pub fn stdout(&self) -> Vec<String> {
        self.stdout.snapshot().lines
    }

    /// Lines captured from the process's standard error so far.
    pub fn stderr(&self) -> Vec<String> {
        self.stderr.snapshot().lines
    }

    /// Generation-stamped snapshot of the standard output buffer.
    pub fn stdout_snapshot(&self) -> LogSnapshot {
        self.stdout.snapshot()
    }

    /// Generation-stamped snapshot of the standard error buffer.
    pub fn stderr_snapshot(&self) -> LogSnapshot {
        self.stderr.snapshot()
    }

    /// Wait for the function process to exit normally; if the wait itself
    /// fails or the process exits abnormally, kill it and return the kill's
    /// outcome.
    pub async fn shutdown(&mut self) -> ServerResult<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| ServerError::illegal_argument("server has not been started"))?;

        match child.wait().await {
            Ok(status) if status.success() => {
                info!("function process exited cleanly");
                Ok(())
            }
            Ok(status) => {
                warn!(%status, "function process exited abnormally, killing");
                child.kill().await.map_err(ServerError::from)
            }
            Err(e) => {
                warn!(error = %e, "waiting for function process failed, killing");
                child.kill().await.map_err(ServerError::from)
            }
        }
    }

    /// Kill the function process immediately, bypassing any wait.
    pub async fn terminate(&mut self) -> ServerResult<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| ServerError::illegal_argument("server has not been started"))?;

        info!("terminating function process");
        child.kill().await.map_err(ServerError::from)
    }
}

/// Compute the time left until the context deadline. `None` means no
/// deadline was given; an already-passed deadline is a timeout before any
/// dispatch.
fn remaining_time(request: &InvokeRequest) -> ServerResult<Option<Duration>> {
    match request.context.deadline()? {
        None => Ok(None),
        Some(deadline) => deadline
            .signed_duration_since(Utc::now())
            .to_std()
            .map(Some)
            .map_err(|_| ServerError::timeout("did not invoke, deadline already exceeded")),
    }
}

/// Map a transport failure onto the error taxonomy.
fn classify_transport_error(url: &str, err: &reqwest::Error) -> ServerError {
    if err.is_timeout() {
        ServerError::timeout("function execution exceeded the deadline")
    } else if is_connection_refused(err) {
        ServerError::connection_refused(url)
    } else {
        ServerError::unknown_system(err.to_string())
    }
}

/// Walk the source chain looking for a refused connection.
fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = current.source();
    }
    false
}

/// The error counter matching a classified transport failure.
fn error_metric(err: &ServerError) -> &'static str {
    match err {
        ServerError::Timeout { .. } => METRIC_TIMEOUT,
        ServerError::ConnectionRefused { .. } => METRIC_CONNECTION_REFUSED,
        _ => METRIC_UNKNOWN_SYSTEM_ERROR,
    }
}

/// Construct the per-invocation metrics client named by the request context,
/// if any. Unrecognized destination types disable metrics for the call.
fn build_metrics_client(dst: Option<&MetricsDestination>) -> Option<Box<dyn MetricsClient>> {
    let dst = dst?;
    match dst.kind.as_str() {
        "wavefront" => Some(Box::new(WavefrontClient::new(&dst.url, &dst.token))),
        other => {
            debug!(kind = other, "no metrics destination configured for this invocation");
            None
        }
    }
}

/// The fixed metric set registered for every metered invocation.
fn invocation_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::counter(METRIC_INVOCATION, "talos.function.invocation"),
        MetricSpec::counter(METRIC_TIMEOUT, "talos.function.timeout"),
        MetricSpec::counter(METRIC_CONNECTION_REFUSED, "talos.function.connectionrefused"),
        MetricSpec::counter(
            METRIC_UNKNOWN_SYSTEM_ERROR,
            "talos.function.unknownsystemerror",
        ),
        MetricSpec::gauge(METRIC_DURATION, "talos.function.duration"),
    ]
}

fn update_best_effort(client: &mut dyn MetricsClient, name: &str, value: MetricValue) {
    if let Err(e) = client.update(name, value) {
        warn!(metric = name, error = %e, "failed to update metric");
    }
}

async fn report_best_effort(client: &mut dyn MetricsClient) {
    if let Err(e) = client.report().await {
        warn!(error = %e, "metrics report failed");
    }
}

async fn decode_response(response: reqwest::Response) -> ServerResult<Value> {
    let body = response
        .bytes()
        .await
        .map_err(|e| ServerError::invalid_response_payload(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| ServerError::invalid_response_payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_splits_command() {
        let factory = ServerFactory::new("python3 -m function_server --verbose").unwrap();
        assert_eq!(factory.program, "python3");
        assert_eq!(factory.args, vec!["-m", "function_server", "--verbose"]);
    }

    #[test]
    fn test_empty_command_is_illegal() {
        for command in ["", "   ", "\t\n"] {
            let err = ServerFactory::new(command).unwrap_err();
            assert!(matches!(err, ServerError::IllegalArgument { .. }));
        }
    }

    #[test]
    fn test_privileged_ports_are_rejected() {
        let factory = ServerFactory::new("sleep 60").unwrap();
        for port in [0, 80, 443, 1023] {
            let err = factory.create_server(port).unwrap_err();
            assert!(matches!(err, ServerError::IllegalArgument { .. }));
        }
    }

    #[test]
    fn test_unprivileged_ports_are_accepted() {
        let factory = ServerFactory::new("sleep 60").unwrap();
        for port in [MIN_PORT, 8080, u16::MAX] {
            let server = factory.create_server(port).unwrap();
            assert_eq!(server.port(), port);
        }
    }

    #[test]
    fn test_error_metric_selection() {
        assert_eq!(error_metric(&ServerError::timeout("late")), METRIC_TIMEOUT);
        assert_eq!(
            error_metric(&ServerError::connection_refused("http://127.0.0.1:9000")),
            METRIC_CONNECTION_REFUSED
        );
        assert_eq!(
            error_metric(&ServerError::unknown_system("broken pipe")),
            METRIC_UNKNOWN_SYSTEM_ERROR
        );
    }

    #[test]
    fn test_invocation_metric_set() {
        let specs = invocation_metrics();
        assert_eq!(specs.len(), 5);
        assert!(specs
            .iter()
            .any(|s| s.series == "talos.function.invocation"));
        assert!(specs.iter().any(|s| s.series == "talos.function.duration"));
    }

    #[test]
    fn test_unrecognized_metrics_destination_is_disabled() {
        let dst = MetricsDestination {
            kind: "statsd".to_string(),
            url: "http://127.0.0.1:8125".to_string(),
            token: String::new(),
        };
        assert!(build_metrics_client(Some(&dst)).is_none());
        assert!(build_metrics_client(None).is_none());
    }

    #[test]
    fn test_past_deadline_is_timeout() {
        let request = InvokeRequest::default().with_context(
            crate::request::RequestContext::default().with_deadline("2001-01-01T00:00:00Z"),
        );
        let err = remaining_time(&request).unwrap_err();
        assert!(matches!(err, ServerError::Timeout { .. }));
    }

    #[test]
    fn test_future_deadline_yields_remaining_time() {
        let deadline = (Utc::now() + chrono::Duration::seconds(60)).to_rfc3339();
        let request = InvokeRequest::default()
            .with_context(crate::request::RequestContext::default().with_deadline(deadline));
        let remaining = remaining_time(&request).unwrap().unwrap();
        assert!(remaining > Duration::from_secs(55));
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_no_deadline_means_no_timeout() {
        assert!(remaining_time(&InvokeRequest::default()).unwrap().is_none());
    }
}
