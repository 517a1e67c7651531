//! Streamable HTTP Transport
//!
//! POST and DELETE handlers.
//!
//! A POST body is decoded, bound to its session, then dispatched while the
//! session's gate is held. The response is produced before the gate is
//! released, so a session never has two requests in dispatch at once.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{session_header, McpState, SESSION_HEADER};
use crate::session::SessionTicket;
use crate::types::error::ErrorData;
use crate::types::jsonrpc::{Frame, JsonRpcReply, RequestId};
use crate::types::protocol::InitializeParams;

/// Handle one POSTed JSON-RPC message.
///
/// 1. Decode the body; on failure reply -32700/-32600 with 400 and close the
///    addressed session
/// 2. `initialize` without a session header allocates a session; anything
///    else needs a known open session (400 missing, 404 unknown)
/// 3. Client replies are acknowledged with 202; notifications dispatch under
///    the session gate, then get 202
/// 4. Requests dispatch under the session gate and return 200, unless the
///    session closed meanwhile (404, response discarded)
#[tracing::instrument(skip(state, headers, body), fields(session_id = tracing::field::Empty))]
pub async fn post_handler(
    State(state): State<Arc<McpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_id = session_header(&headers);
    if let Some(id) = &header_id {
        tracing::Span::current().record("session_id", id.as_str());
    }

    let frame = match Frame::decode(&body) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(error = %error, "Failed to decode JSON-RPC body");
            if let Some(id) = &header_id {
                state.sessions.close(id, "decode failure");
            }
            return reply_response(
                StatusCode::BAD_REQUEST,
                None,
                JsonRpcReply::failure(None, error),
            );
        }
    };

    let (request_id, is_initialize) = match &frame {
        Frame::Message(m) => (m.id.clone(), m.method == "initialize"),
        Frame::Reply(r) => (r.id.clone(), false),
    };

    let created = is_initialize && header_id.is_none();
    let ticket = if created {
        state.sessions.create()
    } else {
        match resolve_session(&state, header_id.as_deref(), request_id.clone()) {
            Ok(ticket) => ticket,
            Err(response) => return response,
        }
    };
    tracing::Span::current().record("session_id", ticket.id.as_str());
    state.sessions.touch(&ticket.id);

    let message = match frame {
        Frame::Message(message) => message,
        Frame::Reply(reply) => {
            tracing::debug!(id = ?reply.id, is_error = reply.is_error(), "Ignoring client reply");
            return empty_response(StatusCode::ACCEPTED, Some(&ticket.id));
        }
    };

    if message.is_notification() {
        tracing::debug!(method = %message.method, "Processing MCP notification");
        // Notifications change lifecycle state, so they queue behind requests
        let _gate = ticket.acquire().await;
        let _ = state.dispatcher.dispatch(&ticket.id, &message).await;
        return empty_response(StatusCode::ACCEPTED, Some(&ticket.id));
    }

    tracing::info!(
        method = %message.method,
        request_id = ?request_id,
        "Processing MCP request"
    );

    let _gate = ticket.acquire().await;
    if !ticket.is_open() {
        return closed_response(&ticket, request_id);
    }

    let outcome = state.dispatcher.dispatch(&ticket.id, &message).await;

    if created && outcome.is_err() {
        state.sessions.close(&ticket.id, "initialize failed");
        return reply_response(
            StatusCode::OK,
            None,
            JsonRpcReply::from_outcome(request_id, outcome),
        );
    }
    if is_initialize && outcome.is_ok() {
        if let Ok(params) = InitializeParams::from_params(message.params.as_ref()) {
            state.sessions.set_initialized(&ticket.id, params.client_info);
        }
    }

    if !ticket.is_open() {
        tracing::debug!(session_id = %ticket.id, "Session closed during dispatch, discarding response");
        return closed_response(&ticket, request_id);
    }

    reply_response(
        StatusCode::OK,
        Some(&ticket.id),
        JsonRpcReply::from_outcome(request_id, outcome),
    )
}

/// Handle DELETE requests (session termination).
#[tracing::instrument(skip(state, headers), fields(session_id = tracing::field::Empty))]
pub async fn delete_handler(
    State(state): State<Arc<McpState>>,
    headers: HeaderMap,
) -> Response {
    let session_id = match session_header(&headers) {
        Some(id) => id,
        None => {
            return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
        }
    };
    tracing::Span::current().record("session_id", session_id.as_str());

    if state.sessions.close(&session_id, "client delete") {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, "Session not found").into_response()
    }
}

fn resolve_session(
    state: &McpState,
    header_id: Option<&str>,
    request_id: Option<RequestId>,
) -> Result<SessionTicket, Response> {
    let Some(id) = header_id else {
        return Err(reply_response(
            StatusCode::BAD_REQUEST,
            None,
            JsonRpcReply::failure(
                request_id,
                ErrorData::session_not_found("Missing Mcp-Session-Id header"),
            ),
        ));
    };

    state.sessions.ticket(id).ok_or_else(|| {
        reply_response(
            StatusCode::NOT_FOUND,
            None,
            JsonRpcReply::failure(
                request_id,
                ErrorData::session_not_found(format!("Session not found: {}", id)),
            ),
        )
    })
}

fn closed_response(ticket: &SessionTicket, request_id: Option<RequestId>) -> Response {
    reply_response(
        StatusCode::NOT_FOUND,
        None,
        JsonRpcReply::failure(
            request_id,
            ErrorData::session_not_found(format!("Session closed: {}", ticket.id)),
        ),
    )
}

/// Build a JSON reply, with the session header when one applies.
fn reply_response(status: StatusCode, session_id: Option<&str>, reply: JsonRpcReply) -> Response {
    let mut response = (status, Json(reply)).into_response();
    attach_session(&mut response, session_id);
    response
}

/// Build a bodiless response (notifications, client replies).
fn empty_response(status: StatusCode, session_id: Option<&str>) -> Response {
    let mut response = status.into_response();
    attach_session(&mut response, session_id);
    response
}

fn attach_session(response: &mut Response, session_id: Option<&str>) {
    if let Some(header_value) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, header_value);
    }
}
