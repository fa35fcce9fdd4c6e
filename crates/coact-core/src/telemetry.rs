//! Logging setup
//!
//! TigerStyle: Explicit telemetry configuration, initialized once per process.
//!
//! The runtime only emits `tracing` events; binaries and tests decide where
//! they go by calling [`init_telemetry`].

use crate::error::{Error, Result};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Whether to write events to stdout
    pub stdout_enabled: bool,
    /// Log level filter, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Route output through the test harness capture
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "coact".to_string(),
            stdout_enabled: true,
            log_level: "info".to_string(),
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Disable stdout output
    pub fn without_stdout(mut self) -> Self {
        self.stdout_enabled = false;
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Write through the libtest capture so output only shows for failures
    pub fn for_tests(mut self) -> Self {
        self.test_writer = true;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - `COACT_SERVICE_NAME`: Service name (default: "coact")
    /// - `RUST_LOG`: Log level filter (default: "info")
    pub fn from_env() -> Self {
        let service_name =
            std::env::var("COACT_SERVICE_NAME").unwrap_or_else(|_| "coact".to_string());
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            service_name,
            log_level,
            ..Default::default()
        }
    }
}

/// Install a global `tracing` subscriber
///
/// Fails if a subscriber is already installed; tests that race to initialize
/// can ignore the error.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match (config.stdout_enabled, config.test_writer) {
        (false, _) => None,
        (true, false) => Some(tracing_subscriber::fmt::layer().with_target(true).boxed()),
        (true, true) => Some(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_target(true)
                .boxed(),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Internal {
            reason: format!("failed to initialize tracing subscriber: {}", e),
        })?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}
