//! Talos Supervisor - function process sidecar
//!
//! The Talos supervisor is the sidecar that manages one function server
//! process for a function-as-a-service runtime: it spawns the process
//! behind a loopback HTTP endpoint, proxies synchronous invocations to it
//! under a caller-supplied deadline, captures the process's console output,
//! and translates every failure mode into a typed error.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Function Pod                             │
//! │                                                                  │
//! │  ┌─────────────────────┐            ┌─────────────────────────┐  │
//! │  │  Talos Supervisor   │            │    Function Server      │  │
//! │  │                     │            │  (any language runtime) │  │
//! │  │  ┌───────────────┐  │    HTTP    │                         │  │
//! │  │  │ Deadline      │  │ ─────────► │  - User function body   │  │
//! │  │  │ Invocation    │  │  loopback  │  - Listens on $PORT     │  │
//! │  │  │ Log capture   │  │ ◄───────── │  - Writes to stdout/err │  │
//! │  │  │ Metrics       │  │            │                         │  │
//! │  │  └───────────────┘  │            └─────────────────────────┘  │
//! │  └─────────────────────┘                      ▲                  │
//! │             ▲                  spawns, kills  │                  │
//! │             │                  captures output│                  │
//! │             └─────────────────────────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use talos_supervisor::{InvokeRequest, ServerFactory};
//!
//! let factory = ServerFactory::new("python3 -m function_server")?;
//! let mut server = factory.create_server(9000)?;
//! server.start()?;
//!
//! let result = server.invoke(&request).await?;
//! println!("stdout: {:?}", server.stdout());
//!
//! server.shutdown().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/talos-supervisor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capture;
pub mod config;
pub mod error;
pub mod request;
pub mod server;

pub use capture::{LogBuffer, LogSnapshot};
pub use config::{SupervisorConfig, SupervisorConfigBuilder};
pub use error::{ApiError, ServerError, ServerResult};
pub use request::{InvokeRequest, MetricsDestination, RequestContext};
pub use server::{Server, ServerFactory, MIN_PORT};

/// Supervisor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
