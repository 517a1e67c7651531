//! Configuration sections, one per concern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ConfigError;

/// Where the graph database lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to an existing Kùzu database. No default; must be supplied.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Check the database path exists and return it canonicalized.
    pub fn resolve(&self) -> Result<PathBuf, ConfigError> {
        let path = self
            .db_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingStoragePath)?;

        if !path.exists() {
            return Err(ConfigError::StoragePathNotFound { path: path.clone() });
        }

        path.canonicalize()
            .map_err(|_| ConfigError::StoragePathNotFound { path: path.clone() })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to listen on.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// Default: 3002
    #[serde(default = "BindConfig::default_port")]
    pub port: u16,

    /// MCP endpoint path.
    /// Default: /message
    #[serde(default = "BindConfig::default_path")]
    pub path: String,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3002
    }

    fn default_path() -> String {
        "/message".to_string()
    }

    /// `host:port` for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            path: Self::default_path(),
        }
    }
}

/// Protocol session housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Close sessions idle longer than this. 0 disables expiry.
    /// Default: 1800
    #[serde(default = "SessionsConfig::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How often the expiry sweep runs.
    /// Default: 60
    #[serde(default = "SessionsConfig::default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl SessionsConfig {
    fn default_idle_timeout_secs() -> u64 {
        1800
    }

    fn default_cleanup_interval_secs() -> u64 {
        60
    }

    /// None when expiry is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: Self::default_idle_timeout_secs(),
            cleanup_interval_secs: Self::default_cleanup_interval_secs(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Export is off when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// `EnvFilter` directive string. `RUST_LOG` still wins when set.
    /// Default: info,kuzu_mcp=debug,relay=debug
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info,kuzu_mcp=debug,relay=debug".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: Self::default_log_level(),
        }
    }
}
