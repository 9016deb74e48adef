//! Configuration for the Haven intake service.

use haven_clients::RetryPolicy;
use haven_types::PolicyWeights;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote stage endpoints
    #[serde(default)]
    pub stages: StagesConfig,

    /// Retry/backoff tuning for remote stage calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Decision policy weights
    #[serde(default)]
    pub weights: PolicyWeights,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8090".parse().expect("valid default address"),
        }
    }
}

/// Endpoints of the remote decision stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    pub classification_url: String,
    pub risk_url: String,
    pub simulation_url: String,

    /// Timeout for one remote call, in seconds. Per call, not per pipeline.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl StagesConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            classification_url: "http://127.0.0.1:9101/classify".to_string(),
            risk_url: "http://127.0.0.1:9102/score".to_string(),
            simulation_url: "http://127.0.0.1:9103/simulate".to_string(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

/// Bounded exponential backoff tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

fn default_call_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl ServiceConfig {
    /// Load configuration: defaults, then an optional file, then
    /// HAVEN_-prefixed environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HAVEN")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8090);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.weights, PolicyWeights::default());
    }

    #[test]
    fn retry_config_converts_to_a_policy() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn stage_timeout_is_per_call() {
        let stages = StagesConfig::default();
        assert_eq!(stages.call_timeout(), Duration::from_secs(10));
    }
}
