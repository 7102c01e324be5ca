//! Configuration for the Talos supervisor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::server::MIN_PORT;

/// Supervisor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Function server settings.
    pub server: ServerSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl SupervisorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Load configuration from a TOML or JSON file, decided by extension.
    pub fn from_file(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ServerError::illegal_argument(format!("failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| ServerError::illegal_argument(format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| ServerError::illegal_argument(format!("invalid JSON: {e}"))),
            _ => Err(ServerError::illegal_argument(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Environment variables are prefixed with `TALOS_` and use uppercase
    /// `snake_case`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(command) = std::env::var("TALOS_SERVER_COMMAND") {
            self.server.command = command;
        }

        if let Ok(port) = std::env::var("TALOS_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(level) = std::env::var("TALOS_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ServerResult<()> {
        if self.server.command.trim().is_empty() {
            return Err(ServerError::illegal_argument("server.command is required"));
        }

        if self.server.port < MIN_PORT {
            return Err(ServerError::illegal_argument(format!(
                "server.port must be at least {MIN_PORT}"
            )));
        }

        Ok(())
    }
}

/// Function server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Command line that starts the function server, program first.
    pub command: String,
    /// Loopback port the function server is told to listen on.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            command: String::new(),
            port: 9000,
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Log level.
    pub log_level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Builder for `SupervisorConfig`.
#[derive(Debug, Default)]
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    /// Set the function server command line.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.config.server.command = command.into();
        self
    }

    /// Set the function server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.telemetry.log_level = level.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ServerResult<SupervisorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.command.is_empty());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_config_builder() {
        let config = SupervisorConfig::builder()
            .command("python3 -m function_server")
            .port(9100)
            .log_level("debug")
            .build()
            .unwrap();

        assert_eq!(config.server.command, "python3 -m function_server");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_config_validation() {
        let config = SupervisorConfig::builder().build();
        assert!(config.is_err());

        let config = SupervisorConfig::builder()
            .command("node server.js")
            .port(80)
            .build();
        assert!(config.is_err());

        let config = SupervisorConfig::builder()
            .command("node server.js")
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
[server]
command = "python3 -m function_server"
port = 9100

[telemetry]
log_level = "debug"
"#;
        let config: SupervisorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.command, "python3 -m function_server");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"server":{"command":"node server.js"}}"#;
        let config: SupervisorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.command, "node server.js");
        assert_eq!(config.server.port, 9000);
    }
}
