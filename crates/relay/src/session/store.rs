//! Session Store
//!
//! Trait and in-memory implementation for session storage.
//!
//! Spans and events for session lifecycle observability:
//! - `mcp.session.create` - Session creation
//! - `Session initialized` - Client handshake complete
//! - `Session closed` - DELETE, idle expiry, or transport failure

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Lifecycle, SessionRef, SessionTicket, SseSender};
use crate::types::protocol::Implementation;

/// An MCP session.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier (UUID v4).
    pub id: String,

    pub created_at: Instant,

    /// Last activity timestamp.
    pub last_seen: Instant,

    /// Client implementation info (set after initialize).
    pub client_info: Option<Implementation>,

    pub initialized: bool,

    /// SSE channel sender (None if no stream is open).
    pub tx: Option<SseSender>,

    pub(super) lifecycle: Arc<Lifecycle>,

    pub(super) gate: Arc<Mutex<()>>,
}

/// Statistics about active sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub total: usize,
    /// Sessions with an open SSE stream.
    pub connected: usize,
    /// Sessions that completed the initialize handshake.
    pub initialized: usize,
}

/// Session store trait for pluggable storage backends.
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh open session with a generated id.
    fn create(&self) -> SessionTicket;

    /// Ticket for an open session, or None if unknown or closing.
    fn ticket(&self, id: &str) -> Option<SessionTicket>;

    /// Get a session by ID (read-only).
    fn get(&self, id: &str) -> Option<SessionRef<'_>>;

    /// Update the last_seen timestamp.
    fn touch(&self, id: &str);

    fn set_initialized(&self, id: &str, client_info: Implementation);

    /// Attach the server-to-client SSE stream. False if the session is gone.
    fn register_sse(&self, id: &str, tx: SseSender) -> bool;

    /// Close and remove a session. Returns false if it was unknown or
    /// already closing.
    fn close(&self, id: &str, reason: &str) -> bool;

    /// Close sessions idle longer than `max_idle`. Sessions with a live SSE
    /// stream are not idle. Returns the number closed.
    fn cleanup(&self, max_idle: Duration) -> usize;

    fn stats(&self) -> SessionStats;
}

/// In-memory session store using DashMap.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> SessionTicket {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone());
        let ticket = session.ticket();

        let _span = tracing::info_span!("mcp.session.create", mcp.session_id = %id).entered();
        tracing::info!("Created new session");

        self.sessions.insert(id, session);
        ticket
    }

    fn ticket(&self, id: &str) -> Option<SessionTicket> {
        self.sessions
            .get(id)
            .map(|s| s.ticket())
            .filter(SessionTicket::is_open)
    }

    fn get(&self, id: &str) -> Option<SessionRef<'_>> {
        self.sessions.get(id)
    }

    fn touch(&self, id: &str) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.touch();
        }
    }

    fn set_initialized(&self, id: &str, client_info: Implementation) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            tracing::info!(
                session_id = %id,
                client_name = %client_info.name,
                client_version = %client_info.version,
                "Session initialized"
            );
            session.set_initialized(client_info);
        }
    }

    fn register_sse(&self, id: &str, tx: SseSender) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) if session.state() == super::SessionState::Open => {
                session.register_sse(tx);
                tracing::info!(session_id = %id, "Registered SSE connection");
                true
            }
            _ => false,
        }
    }

    fn close(&self, id: &str, reason: &str) -> bool {
        let lifecycle = match self.sessions.get(id) {
            Some(session) => session.lifecycle.clone(),
            None => return false,
        };

        if !lifecycle.begin_close() {
            return false;
        }

        // Dropping the session drops its SSE sender, which ends the stream.
        let removed = self.sessions.remove(id);
        lifecycle.finish_close();

        if let Some((_, session)) = removed {
            tracing::info!(
                session_id = %id,
                reason = %reason,
                age_secs = session.created_at.elapsed().as_secs(),
                "Session closed"
            );
        }
        true
    }

    fn cleanup(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                !session.is_connected() && session.idle_duration() > max_idle
            })
            .map(|entry| entry.key().clone())
            .collect();

        let closed = stale
            .iter()
            .filter(|id| self.close(id, "idle timeout"))
            .count();

        if closed > 0 {
            tracing::info!(
                closed = closed,
                remaining = self.sessions.len(),
                "Session cleanup completed"
            );
        }

        closed
    }

    fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total: self.sessions.len(),
            ..Default::default()
        };

        for entry in self.sessions.iter() {
            if entry.value().is_connected() {
                stats.connected += 1;
            }
            if entry.value().initialized {
                stats.initialized += 1;
            }
        }

        stats
    }
}

/// Spawn a background task that periodically closes idle sessions.
pub fn spawn_cleanup_task(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    max_idle: Duration,
    cancel: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Session cleanup task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    store.cleanup(max_idle);
                }
            }
        }
    })
}
