//! Query executor adapter.
//!
//! Runs one Cypher statement against the shared engine connection and hands
//! back every row, fully materialized. The engine-side cursor is released
//! before [`QueryExecutor::execute`] returns, on success and on failure.

use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// One result row keyed by column name.
pub type QueryRow = Map<String, Value>;

/// Engine failure, carrying the engine's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Forward-only iteration over a statement's results.
pub trait RowCursor: Send {
    /// Next row in engine order, or `None` once exhausted.
    fn next_row(&mut self) -> Option<Result<QueryRow, BackendError>>;

    /// Free engine-side resources. Called exactly once.
    fn release(&mut self);
}

/// An embedded engine holding one shared connection.
pub trait QueryEngine: Send + Sync + 'static {
    /// Submit a statement and return a cursor over its results.
    fn open(&self, statement: &str) -> Result<Box<dyn RowCursor + '_>, BackendError>;
}

/// One engine connection, used by one statement at a time.
///
/// A panic inside [`SharedConnection::with`] comes back as a [`BackendError`]
/// and the connection stays usable for the next statement.
pub struct SharedConnection<C> {
    inner: Mutex<C>,
}

impl<C> SharedConnection<C> {
    pub fn new(conn: C) -> Self {
        Self {
            inner: Mutex::new(conn),
        }
    }

    /// Run `f` with exclusive use of the connection.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> Result<R, BackendError>) -> Result<R, BackendError> {
        let conn = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match panic::catch_unwind(AssertUnwindSafe(|| f(&conn))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "Engine panicked during statement");
                Err(BackendError::new(format!("engine panicked: {}", message)))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Releases the wrapped cursor when dropped, however the drain ended.
struct CursorGuard<'a> {
    cursor: Box<dyn RowCursor + 'a>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.cursor.release();
    }
}

fn drain(guard: &mut CursorGuard<'_>) -> Result<Vec<QueryRow>, BackendError> {
    let mut rows = Vec::new();
    while let Some(row) = guard.cursor.next_row() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Blocking execute: open, drain, release.
pub fn execute_blocking(engine: &dyn QueryEngine, statement: &str) -> Result<Vec<QueryRow>, BackendError> {
    let mut guard = CursorGuard {
        cursor: engine.open(statement)?,
    };
    drain(&mut guard)
}

/// Shared handle to the engine, passed to tool handlers.
#[derive(Clone)]
pub struct QueryExecutor {
    engine: Arc<dyn QueryEngine>,
}

impl QueryExecutor {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// Execute one statement on the blocking pool.
    ///
    /// No syntactic checks and no retries; the engine rejects bad input.
    pub async fn execute(&self, statement: &str) -> Result<Vec<QueryRow>, BackendError> {
        let engine = Arc::clone(&self.engine);
        let statement = statement.to_string();
        let started = Instant::now();

        let outcome = tokio::task::spawn_blocking(move || execute_blocking(engine.as_ref(), &statement))
            .await
            .map_err(|e| BackendError::new(format!("query task failed: {}", e)))?;

        match &outcome {
            Ok(rows) => debug!(
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query completed"
            ),
            Err(e) => warn!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Query failed"
            ),
        }
        outcome
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor").finish_non_exhaustive()
    }
}
