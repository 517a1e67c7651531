//! Legacy SSE Transport
//!
//! The two-endpoint HTTP+SSE transport older MCP clients still speak:
//! - GET `/sse` allocates a session and opens its event stream. The first
//!   event, `endpoint`, carries the URL to POST messages to.
//! - POST `/messages/?session_id=<id>` takes one JSON-RPC message. The reply
//!   travels back on the stream as a `message` event; the POST gets 202.
//!
//! Sessions are shared with the Streamable HTTP endpoint and follow the same
//! gate and lifecycle rules. Dropping the stream closes the session.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::McpState;
use crate::session::{SessionStore, SseSender};
use crate::types::error::ErrorData;
use crate::types::jsonrpc::{Frame, JsonRpcReply};
use crate::types::protocol::InitializeParams;

/// Query parameters for the message endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageParams {
    pub session_id: String,
}

/// Closes the session when the event stream is dropped.
struct StreamCloser {
    sessions: Arc<dyn SessionStore>,
    id: String,
}

impl Drop for StreamCloser {
    fn drop(&mut self) {
        self.sessions.close(&self.id, "stream closed");
    }
}

/// POST target announced in the `endpoint` event, relative to where `/sse`
/// is mounted.
fn endpoint_url(sse_path: &str, session_id: &str) -> String {
    let base = sse_path.strip_suffix("sse").unwrap_or("/");
    format!("{}messages/?session_id={}", base, session_id)
}

/// Handle GET `/sse`: new session, endpoint event, then keep-alives and replies.
#[tracing::instrument(skip(state, uri), fields(session_id = tracing::field::Empty))]
pub async fn legacy_sse_handler(
    State(state): State<Arc<McpState>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let ticket = state.sessions.create();
    tracing::Span::current().record("session_id", ticket.id.as_str());

    let (tx, rx) = mpsc::channel::<Result<Event, axum::Error>>(32);
    if !state.sessions.register_sse(&ticket.id, tx.clone()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Session closed before stream opened")
            .into_response();
    }

    let endpoint = Event::default()
        .event("endpoint")
        .data(endpoint_url(uri.path(), &ticket.id));
    if tx.send(Ok(endpoint)).await.is_err() {
        tracing::warn!("Failed to send endpoint event");
    }
    drop(tx);

    tracing::info!(session_id = %ticket.id, "Legacy SSE stream opened");

    let closer = StreamCloser {
        sessions: Arc::clone(&state.sessions),
        id: ticket.id.clone(),
    };
    let stream = ReceiverStream::new(rx).map(move |result| {
        let _ = &closer;
        match result {
            Ok(event) => Ok::<_, std::convert::Infallible>(event),
            Err(_) => Ok(Event::default().data("error")),
        }
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
        .into_response()
}

/// Handle POST `/messages/`.
///
/// 1. Unknown or closed session: 404
/// 2. Undecodable body: 400 with the JSON-RPC error, and the session closes
/// 3. Client replies: 202
/// 4. Messages dispatch under the session gate; a request's reply is sent
///    as a `message` event before the gate is released, then 202
#[tracing::instrument(skip(state, params, body), fields(session_id = %params.session_id))]
pub async fn legacy_message_handler(
    State(state): State<Arc<McpState>>,
    Query(params): Query<MessageParams>,
    body: Bytes,
) -> Response {
    let Some(ticket) = state.sessions.ticket(&params.session_id) else {
        let reply = JsonRpcReply::failure(
            None,
            ErrorData::session_not_found(format!("Session not found: {}", params.session_id)),
        );
        return (StatusCode::NOT_FOUND, Json(reply)).into_response();
    };
    state.sessions.touch(&ticket.id);

    let message = match Frame::decode(&body) {
        Ok(Frame::Message(message)) => message,
        Ok(Frame::Reply(reply)) => {
            tracing::debug!(id = ?reply.id, is_error = reply.is_error(), "Ignoring client reply");
            return StatusCode::ACCEPTED.into_response();
        }
        Err(error) => {
            tracing::warn!(error = %error, "Failed to decode JSON-RPC body");
            state.sessions.close(&ticket.id, "decode failure");
            return (StatusCode::BAD_REQUEST, Json(JsonRpcReply::failure(None, error)))
                .into_response();
        }
    };

    tracing::info!(
        method = %message.method,
        request_id = ?message.id,
        "Processing MCP message"
    );

    let _gate = ticket.acquire().await;
    if !ticket.is_open() {
        return (StatusCode::NOT_FOUND, "Session closed").into_response();
    }

    let outcome = state.dispatcher.dispatch(&ticket.id, &message).await;
    if message.is_notification() {
        return StatusCode::ACCEPTED.into_response();
    }

    if message.method == "initialize" && outcome.is_ok() {
        if let Ok(params) = InitializeParams::from_params(message.params.as_ref()) {
            state.sessions.set_initialized(&ticket.id, params.client_info);
        }
    }

    // Clone the sender out so no map lock is held across the send
    let tx: Option<SseSender> = state.sessions.get(&ticket.id).and_then(|s| s.tx.clone());
    let reply = JsonRpcReply::from_outcome(message.id.clone(), outcome);

    match (tx, serde_json::to_string(&reply)) {
        (Some(tx), Ok(data)) => {
            if let Err(e) = tx.send(Ok(Event::default().event("message").data(data))).await {
                tracing::warn!(error = ?e, "Failed to send reply via SSE");
            }
        }
        (None, _) => tracing::warn!("No SSE stream for session, reply dropped"),
        (_, Err(e)) => tracing::error!(error = %e, "Failed to serialize reply"),
    }

    StatusCode::ACCEPTED.into_response()
}
