//! Coordinator configuration.

use std::time::Duration;

use lra_client::ClientConfig;

/// Recovery engine configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Interval between periodic sweeps.
    pub sweep_interval: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(2),
        }
    }
}

/// Main coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Participant client configuration, including the external base URL
    /// used to mint LRA URIs.
    pub client_config: ClientConfig,
    /// Recovery configuration.
    pub recovery_config: RecoveryConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            client_config: ClientConfig::default(),
            recovery_config: RecoveryConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("COORDINATOR_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("COORDINATOR_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(ms) = std::env::var("RECOVERY_SWEEP_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                config.recovery_config.sweep_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config.client_config = ClientConfig::from_env();

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.recovery_config.sweep_interval.is_zero() {
            return Err("Recovery sweep interval cannot be zero".to_string());
        }

        self.client_config.validate()
    }
}
