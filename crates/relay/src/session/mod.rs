//! Session Management
//!
//! One session per logical client, created by the `initialize` handshake and
//! destroyed by DELETE, idle expiry, or a transport decode failure.
//!
//! Each session carries a lifecycle (`open -> closing -> closed`) and a
//! dispatch gate. A request holds the gate from dispatch until its response
//! is produced, so requests within one session never overlap.

mod store;

pub use store::{spawn_cleanup_task, InMemorySessionStore, Session, SessionStats, SessionStore};

use axum::response::sse::Event;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

use crate::types::protocol::Implementation;

/// SSE event sender type alias.
pub type SseSender = mpsc::Sender<Result<Event, axum::Error>>;

/// A reference to a session (from DashMap).
pub type SessionRef<'a> = dashmap::mapref::one::Ref<'a, String, Session>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// Atomic lifecycle flag shared between the store and in-flight requests.
#[derive(Debug, Default)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `open -> closing`. Only one caller wins.
    pub fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish_close(&self) {
        self.0.store(2, Ordering::Release);
    }
}

/// What a request needs to hold on to while it is in flight.
///
/// Cloned out of the store so no map lock is held across awaits.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub id: String,
    lifecycle: Arc<Lifecycle>,
    gate: Arc<Mutex<()>>,
}

impl SessionTicket {
    /// Wait for this session's dispatch gate.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.gate.clone().lock_owned().await
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle.state() == SessionState::Open
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_seen: now,
            client_info: None,
            initialized: false,
            tx: None,
            lifecycle: Arc::new(Lifecycle::default()),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            id: self.id.clone(),
            lifecycle: self.lifecycle.clone(),
            gate: self.gate.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Check if the session has an active SSE connection.
    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().map(|tx| !tx.is_closed()).unwrap_or(false)
    }

    /// Time since last activity.
    pub fn idle_duration(&self) -> std::time::Duration {
        self.last_seen.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn set_initialized(&mut self, client_info: Implementation) {
        self.initialized = true;
        self.client_info = Some(client_info);
        self.touch();
    }

    pub fn register_sse(&mut self, tx: SseSender) {
        self.tx = Some(tx);
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state(), SessionState::Open);

        assert!(lifecycle.begin_close());
        assert_eq!(lifecycle.state(), SessionState::Closing);
        assert!(!lifecycle.begin_close());

        lifecycle.finish_close();
        assert_eq!(lifecycle.state(), SessionState::Closed);
        assert!(!lifecycle.begin_close());
    }

    #[test]
    fn test_ticket_tracks_session_state() {
        let session = Session::new("s".to_string());
        let ticket = session.ticket();
        assert!(ticket.is_open());

        session.lifecycle.begin_close();
        assert!(!ticket.is_open());
        assert_eq!(ticket.state(), SessionState::Closing);
    }

    #[tokio::test]
    async fn test_gate_is_exclusive() {
        let session = Session::new("s".to_string());
        let ticket = session.ticket();

        let guard = ticket.acquire().await;
        assert!(session.gate.try_lock().is_err());
        drop(guard);
        assert!(session.gate.try_lock().is_ok());
    }
}
