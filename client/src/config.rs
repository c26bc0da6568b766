//! Participant client configuration.

use std::time::Duration;

/// Configuration for the outbound participant client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// External base URL of this coordinator, used to render LRA context
    /// headers (e.g. `http://host:8080/lra-coordinator`).
    pub lra_base_url: String,
    /// Per-request timeout for participant calls.
    pub request_timeout: Duration,
    /// Connection timeout for participant calls.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lra_base_url: "http://localhost:8080/lra-coordinator".to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("LRA_BASE_URL") {
            config.lra_base_url = base;
        }

        if let Ok(ms) = std::env::var("PARTICIPANT_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.lra_base_url.is_empty() {
            return Err("LRA base URL cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = ClientConfig::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
