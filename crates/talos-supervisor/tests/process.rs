//! Lifecycle and console-capture tests against real child processes.

use std::time::Duration;

use tokio::net::TcpListener;

use talos_supervisor::{InvokeRequest, Server, ServerError, ServerFactory};

/// Poll `condition` for up to ~2.5 seconds.
async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

/// A started server running the given command, bound to a port nothing
/// listens on.
async fn started(command: &str) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut server = ServerFactory::new(command)
        .unwrap()
        .create_server(port)
        .unwrap();
    server.start().unwrap();
    server
}

#[tokio::test]
async fn captures_ordered_stdout_lines() {
    // printf expands the escapes itself; no shell involved.
    let mut server = started(r"printf line1\nline2\n").await;

    assert!(wait_until(|| server.stdout().len() == 2).await);
    assert_eq!(server.stdout(), vec!["line1", "line2"]);
    assert!(server.stderr().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn captures_trailing_partial_line() {
    let mut server = started("printf partial").await;

    assert!(wait_until(|| !server.stdout().is_empty()).await);
    assert_eq!(server.stdout(), vec!["partial"]);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn captures_stderr_separately() {
    let mut server = started("ls /talos-no-such-path").await;

    assert!(wait_until(|| !server.stderr().is_empty()).await);
    assert!(server
        .stderr()
        .iter()
        .any(|line| line.contains("talos-no-such-path")));
    assert!(server.stdout().is_empty());

    // Non-zero exit surfaces through shutdown's fallback kill.
    assert!(server.shutdown().await.is_err());
}

#[tokio::test]
async fn invoke_clears_captured_output_before_dispatch() {
    let mut server = started(r"printf line1\nline2\n").await;
    assert!(wait_until(|| server.stdout().len() == 2).await);
    let before = server.stdout_snapshot();

    // Nothing listens on the port, so the call fails after the reset.
    let err = server.invoke(&InvokeRequest::default()).await.unwrap_err();
    assert!(matches!(err, ServerError::ConnectionRefused { .. }));

    let after = server.stdout_snapshot();
    assert!(after.lines.is_empty());
    assert_eq!(after.generation, before.generation + 1);
    assert_eq!(server.stderr_snapshot().generation, 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn injects_port_into_the_child_environment() {
    let mut server = ServerFactory::new("printenv PORT")
        .unwrap()
        .create_server(4242)
        .unwrap();
    server.start().unwrap();

    assert!(wait_until(|| !server.stdout().is_empty()).await);
    assert_eq!(server.stdout(), vec!["4242"]);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_returns_ok_for_a_clean_exit() {
    let mut server = started("true").await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_kills_and_surfaces_the_outcome_on_wait_failure() {
    let mut server = started("false").await;
    assert!(server.shutdown().await.is_err());
}

#[tokio::test]
async fn terminate_kills_a_running_process() {
    let mut server = started("sleep 60").await;
    server.terminate().await.unwrap();
}

#[tokio::test]
async fn terminate_issues_a_kill_even_after_natural_exit() {
    let mut server = started("true").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The child has exited but was never waited on; the kill still goes out.
    server.terminate().await.unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut server = started("sleep 60").await;
    let err = server.start().unwrap_err();
    assert!(matches!(err, ServerError::IllegalArgument { .. }));
    server.terminate().await.unwrap();
}

#[tokio::test]
async fn lifecycle_calls_require_a_started_server() {
    let mut server = ServerFactory::new("sleep 60")
        .unwrap()
        .create_server(9000)
        .unwrap();
    assert!(server.shutdown().await.is_err());
    assert!(server.terminate().await.is_err());
}

#[tokio::test]
async fn spawn_failure_surfaces_as_io_error() {
    let mut server = ServerFactory::new("/talos-no-such-binary")
        .unwrap()
        .create_server(9000)
        .unwrap();
    let err = server.start().unwrap_err();
    assert!(matches!(err, ServerError::Io(_)));
}
