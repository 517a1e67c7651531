//! Layered configuration loading for kuzu-mcp.
//!
//! # Usage
//!
//! ```rust,no_run
//! use kuzuconf::KuzuMcpConfig;
//!
//! let (config, sources) = KuzuMcpConfig::load_with_sources_from(None).expect("config");
//! let db = config.storage.resolve().expect("database path");
//! println!("serving {} on {}", db.display(), config.bind.addr());
//! println!("loaded from {:?}", sources.files);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/kuzu-mcp/config.toml` (system)
//! 2. `~/.config/kuzu-mcp/config.toml` (user)
//! 3. `./kuzu-mcp.toml` (local override, or the `--config` path instead)
//! 4. Environment variables (`KUZU_DB_PATH`, `KUZU_MCP_*`, `PORT`, `OTEL_EXPORTER_OTLP_ENDPOINT`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example Config
//!
//! ```toml
//! [storage]
//! db_path = "~/graphs/demo.kuzu"
//!
//! [bind]
//! host = "0.0.0.0"
//! port = 3002
//! path = "/message"
//!
//! [sessions]
//! idle_timeout_secs = 1800
//! cleanup_interval_secs = 60
//!
//! [telemetry]
//! otlp_endpoint = "http://127.0.0.1:4317"
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{BindConfig, SessionsConfig, StorageConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Kuzu DB path missing: pass DB_PATH or set KUZU_DB_PATH")]
    MissingStoragePath,

    #[error("Kuzu DB path invalid: {path} does not exist")]
    StoragePathNotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete kuzu-mcp configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KuzuMcpConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KuzuMcpConfig {
    /// Load configuration from optional path and return information about sources.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./kuzu-mcp.toml`. System and user configs still load first.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = KuzuMcpConfig::default();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::FileRead {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }
        }

        for path in loader::discover_config_files_with_override(config_path) {
            loader::apply_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }
}
