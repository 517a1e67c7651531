//! SSE Handler
//!
//! GET on the MCP endpoint opens the server-to-client event stream for an
//! existing session. This server never initiates requests, so the stream only
//! carries keep-alive pings; it ends when the session closes.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::{session_header, McpState, SESSION_HEADER};

#[tracing::instrument(skip(state, headers), fields(session_id = tracing::field::Empty))]
pub async fn sse_handler(State(state): State<Arc<McpState>>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_header(&headers) else {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    };
    tracing::Span::current().record("session_id", session_id.as_str());

    let (tx, rx) = mpsc::channel::<Result<Event, axum::Error>>(32);

    if !state.sessions.register_sse(&session_id, tx) {
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    }

    tracing::info!(session_id = %session_id, "SSE stream opened");

    let stream = ReceiverStream::new(rx).map(|result| match result {
        Ok(event) => Ok::<_, std::convert::Infallible>(event),
        Err(_) => Ok(Event::default().data("error")),
    });

    let mut response = Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}
