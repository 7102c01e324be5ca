//! Talos Supervisor - Entry point
//!
//! This is the main binary for the Talos function-process supervisor.

use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talos_supervisor::{ServerFactory, SupervisorConfig};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Function server command line.
    command: Option<String>,
    /// Function server port.
    port: Option<u16>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut command = None;
        let mut port = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--command" => {
                    command = args.next();
                }
                "--port" | "-p" => {
                    port = args.next().and_then(|value| value.parse().ok());
                    if port.is_none() {
                        eprintln!("Invalid or missing value for --port");
                        std::process::exit(1);
                    }
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("talos-supervisor {}", talos_supervisor::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self {
            config,
            command,
            port,
        }
    }
}

fn print_help() {
    println!(
        r"Talos Supervisor - function process sidecar

USAGE:
    talos-supervisor [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Path to configuration file (TOML or JSON)
        --command <COMMAND>  Function server command line (program first)
    -p, --port <PORT>        Loopback port for the function server (>= 1024)
    -h, --help               Print help information
    -v, --version            Print version information

ENVIRONMENT VARIABLES:
    TALOS_SERVER_COMMAND     Function server command line (required)
    TALOS_SERVER_PORT        Function server port (default: 9000)
    TALOS_LOG_LEVEL          Log level (default: info)

EXAMPLES:
    # Run with configuration file
    talos-supervisor --config /etc/talos/supervisor.toml

    # Run with environment variables
    TALOS_SERVER_COMMAND='python3 -m function_server' talos-supervisor
"
    );
}

#[tokio::main]
async fn main() {
    // Parse arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match args.config {
        Some(path) => match SupervisorConfig::from_file(&path) {
            Ok(config) => config.with_env_overrides(),
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                std::process::exit(1);
            }
        },
        None => SupervisorConfig::default().with_env_overrides(),
    };

    if let Some(command) = args.command {
        config.server.command = command;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.telemetry.log_level)
                }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Starting Talos supervisor v{}", talos_supervisor::VERSION);
    info!("Function server command: {}", config.server.command);
    info!("Function server port: {}", config.server.port);

    // Create and start the function server
    let factory = match ServerFactory::from_config(&config) {
        Ok(factory) => factory,
        Err(e) => {
            error!("Failed to create server factory: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = match factory.create_server(config.server.port) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start() {
        error!("Failed to start function process: {}", e);
        std::process::exit(1);
    }

    // Run until interrupted
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutdown signal received");
    if let Err(e) = server.terminate().await {
        error!("Failed to terminate function process: {}", e);
        std::process::exit(1);
    }
}
