//! HTTP server: MCP endpoint, health check, session housekeeping.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use relay::{Dispatcher, Implementation, McpState, Registry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// `host:port` to bind
    pub addr: String,
    /// MCP endpoint path
    pub path: String,
    /// Sessions idle this long are closed; `None` keeps them forever
    pub idle_timeout: Option<Duration>,
    pub cleanup_interval: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3002".to_string(),
            path: "/message".to_string(),
            idle_timeout: Some(Duration::from_secs(1800)),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Server state for health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub mcp: Arc<McpState>,
    pub start_time: Instant,
}

/// Health check endpoint
pub async fn handle_health(State(state): State<HealthState>) -> Json<Value> {
    let stats = state.mcp.sessions.stats();

    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": {
            "total": stats.total,
            "connected": stats.connected,
            "initialized": stats.initialized,
        }
    }))
}

/// MCP state for the given registry, announced as the `kuzu` server.
pub fn mcp_state(registry: Registry) -> Arc<McpState> {
    let server_info = Implementation::new("kuzu", env!("CARGO_PKG_VERSION")).with_title("Kùzu");
    let dispatcher = Dispatcher::new(registry, server_info)
        .with_instructions(
            "Use the `query` tool to run Cypher against the Kùzu graph database. \
             Results come back as a JSON array of rows.",
        );
    Arc::new(McpState::new(dispatcher))
}

/// Assemble the router: MCP endpoint at `path`, the legacy `/sse` and
/// `/messages/` pair at the root, plus `/health`.
pub fn app(state: Arc<McpState>, path: &str) -> Router {
    let health_router = Router::new()
        .route("/health", get(handle_health))
        .with_state(HealthState {
            mcp: Arc::clone(&state),
            start_time: Instant::now(),
        });

    let mcp_router = relay::router(Arc::clone(&state));
    let app = if path == "/" {
        Router::new().merge(mcp_router)
    } else {
        Router::new().nest(path, mcp_router)
    };

    // A main endpoint sitting on a legacy route shadows the legacy transport
    let app = if path == "/sse" || path.starts_with("/messages") {
        tracing::warn!(path, "Legacy SSE transport disabled: path collides with its routes");
        app
    } else {
        app.merge(relay::legacy_router(state))
    };

    app.merge(health_router).layer(TraceLayer::new_for_http())
}

/// Run the server until SIGINT or SIGTERM.
pub async fn run(config: ServeConfig, registry: Registry) -> Result<()> {
    info!("Kùzu MCP server starting");

    let state = mcp_state(registry);

    let cancel_token = CancellationToken::new();
    let cleanup_handle = config.idle_timeout.map(|idle| {
        info!(
            idle_secs = idle.as_secs(),
            interval_secs = config.cleanup_interval.as_secs(),
            "Session expiry enabled"
        );
        relay::spawn_cleanup_task(
            Arc::clone(&state.sessions),
            config.cleanup_interval,
            idle,
            cancel_token.clone(),
        )
    });

    let app = app(Arc::clone(&state), &config.path);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    info!("MCP endpoint: http://{}{}", config.addr, config.path);
    info!("Legacy SSE endpoint: http://{}/sse", config.addr);
    info!("Health: GET http://{}/health", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel_token.cancel();
    if let Some(handle) = cleanup_handle {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
