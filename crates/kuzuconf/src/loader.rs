//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, KuzuMcpConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). Only existing
/// files are returned. A CLI path replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/kuzu-mcp/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("kuzu-mcp/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("kuzu-mcp.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and layer its values over `config`.
pub fn apply_file(config: &mut KuzuMcpConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Layer the keys present in a TOML document over `config`.
///
/// Keys absent from the document keep their current value, so files stack.
pub(crate) fn apply_toml(
    config: &mut KuzuMcpConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let bad = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{} must be {}", key, expected),
    };

    if let Some(storage) = table.get("storage").and_then(|v| v.as_table()) {
        if let Some(v) = storage.get("db_path") {
            let s = v.as_str().ok_or_else(|| bad("storage.db_path", "a string"))?;
            config.storage.db_path = Some(expand_path(s));
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host") {
            config.bind.host = v.as_str().ok_or_else(|| bad("bind.host", "a string"))?.to_string();
        }
        if let Some(v) = bind.get("port") {
            config.bind.port = v
                .as_integer()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| bad("bind.port", "an integer in 0..=65535"))?;
        }
        if let Some(v) = bind.get("path") {
            let p = v.as_str().ok_or_else(|| bad("bind.path", "a string"))?;
            if !p.starts_with('/') {
                return Err(bad("bind.path", "an absolute path starting with '/'"));
            }
            config.bind.path = p.to_string();
        }
    }

    if let Some(sessions) = table.get("sessions").and_then(|v| v.as_table()) {
        if let Some(v) = sessions.get("idle_timeout_secs") {
            config.sessions.idle_timeout_secs = v
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| bad("sessions.idle_timeout_secs", "a non-negative integer"))?;
        }
        if let Some(v) = sessions.get("cleanup_interval_secs") {
            config.sessions.cleanup_interval_secs = v
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| bad("sessions.cleanup_interval_secs", "a non-negative integer"))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("otlp_endpoint") {
            let s = v
                .as_str()
                .ok_or_else(|| bad("telemetry.otlp_endpoint", "a string"))?;
            config.telemetry.otlp_endpoint = (!s.is_empty()).then(|| s.to_string());
        }
        if let Some(v) = telemetry.get("log_level") {
            config.telemetry.log_level = v
                .as_str()
                .ok_or_else(|| bad("telemetry.log_level", "a string"))?
                .to_string();
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut KuzuMcpConfig, sources: &mut ConfigSources) {
    apply_env_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides read through `lookup`. Where two variables set the same
/// value, the more specific one is applied last and wins.
pub fn apply_env_overrides_from<F>(config: &mut KuzuMcpConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("KUZU_DB_PATH").filter(|v| !v.is_empty()) {
        config.storage.db_path = Some(expand_path(&v));
        sources.env_overrides.push("KUZU_DB_PATH".to_string());
    }

    if let Some(v) = lookup("KUZU_MCP_HOST") {
        config.bind.host = v;
        sources.env_overrides.push("KUZU_MCP_HOST".to_string());
    }
    // Generic PORT first so KUZU_MCP_PORT can override it
    for key in ["PORT", "KUZU_MCP_PORT"] {
        if let Some(port) = lookup(key).and_then(|v| v.parse().ok()) {
            config.bind.port = port;
            sources.env_overrides.push(key.to_string());
        }
    }

    // Standard OTEL variable first, ours second
    for key in ["OTEL_EXPORTER_OTLP_ENDPOINT", "KUZU_MCP_OTLP_ENDPOINT"] {
        if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
            config.telemetry.otlp_endpoint = Some(v);
            sources.env_overrides.push(key.to_string());
        }
    }
    if let Some(v) = lookup("KUZU_MCP_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("KUZU_MCP_LOG_LEVEL".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
