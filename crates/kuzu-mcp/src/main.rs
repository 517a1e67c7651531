//! kuzu-mcp - serve a Kùzu database as an MCP Cypher tool
//!
//! ```text
//! kuzu-mcp ./graph.kuzu --port 3002
//! KUZU_DB_PATH=./graph.kuzu kuzu-mcp
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use kuzuconf::KuzuMcpConfig;
use std::path::PathBuf;
use std::sync::Arc;

use kuzu_mcp::kuzu::KuzuEngine;
use kuzu_mcp::{build_registry, serve, telemetry, QueryExecutor};

#[derive(Parser)]
#[command(name = "kuzu-mcp")]
#[command(about = "MCP server exposing a Kùzu graph database")]
#[command(version)]
struct Cli {
    /// Path to an existing Kùzu database (falls back to KUZU_DB_PATH)
    db_path: Option<PathBuf>,

    /// HTTP port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Config file (replaces ./kuzu-mcp.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
    #[arg(long)]
    otlp_endpoint: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut KuzuMcpConfig) {
        if let Some(path) = self.db_path {
            config.storage.db_path = Some(path);
        }
        if let Some(port) = self.port {
            config.bind.port = port;
        }
        if let Some(host) = self.host {
            config.bind.host = host;
        }
        if let Some(endpoint) = self.otlp_endpoint {
            config.telemetry.otlp_endpoint = Some(endpoint);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Everything up to the storage check fails before any socket is opened
    let (mut config, sources) = KuzuMcpConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    let db_path = config
        .storage
        .resolve()
        .context("❌ Kuzu DB path invalid or missing.")?;

    let _telemetry = telemetry::init(
        &config.telemetry.log_level,
        config.telemetry.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(files = ?sources.files, env = ?sources.env_overrides, "Configuration loaded");

    let engine = KuzuEngine::open(&db_path)
        .with_context(|| format!("Failed to open Kùzu database at {}", db_path.display()))?;
    let executor = QueryExecutor::new(Arc::new(engine));
    let registry = build_registry(executor)?;

    let serve_config = serve::ServeConfig {
        addr: config.bind.addr(),
        path: config.bind.path.clone(),
        idle_timeout: config.sessions.idle_timeout(),
        cleanup_interval: config.sessions.cleanup_interval(),
    };

    serve::run(serve_config, registry).await
}
