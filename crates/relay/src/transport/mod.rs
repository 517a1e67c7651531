//! MCP HTTP Transport
//!
//! Streamable HTTP on a single endpoint:
//! - POST - one JSON-RPC message per body, response returned directly
//! - GET - optional server-to-client SSE stream for a session
//! - DELETE - terminate a session
//!
//! Session ID travels in the `Mcp-Session-Id` header.
//!
//! [`legacy_router`] adds the older two-endpoint HTTP+SSE transport
//! (`GET /sse`, `POST /messages/`) over the same sessions.

mod legacy;
mod sse;
mod streamable;

pub use legacy::{legacy_message_handler, legacy_sse_handler, MessageParams};
pub use sse::sse_handler;
pub use streamable::{delete_handler, post_handler};

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::protocol::Dispatcher;
use crate::session::{InMemorySessionStore, SessionStore};

/// Session header name (HTTP header names are case-insensitive).
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Shared state for MCP handlers.
pub struct McpState {
    pub dispatcher: Arc<Dispatcher>,

    pub sessions: Arc<dyn SessionStore>,
}

impl McpState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_session_store(dispatcher, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_session_store(dispatcher: Dispatcher, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            sessions,
        }
    }
}

/// Build an axum Router for the MCP endpoint.
///
/// All three methods share the router root, so mount it with
/// `Router::nest("/message", router(state))`.
pub fn router(state: Arc<McpState>) -> Router {
    Router::new()
        .route(
            "/",
            post(post_handler).get(sse_handler).delete(delete_handler),
        )
        .with_state(state)
}

/// Build an axum Router for the legacy HTTP+SSE transport.
///
/// Routes are absolute (`/sse`, `/messages/`), so merge it where the
/// endpoint event should point.
pub fn legacy_router(state: Arc<McpState>) -> Router {
    Router::new()
        .route("/sse", get(legacy_sse_handler))
        .route("/messages", post(legacy_message_handler))
        .route("/messages/", post(legacy_message_handler))
        .with_state(state)
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
