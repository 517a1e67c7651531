//! Shared harness: an in-process router over a scripted engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use kuzu_mcp::{app, build_registry, mcp_state, BackendError, QueryEngine, QueryExecutor, QueryRow, RowCursor};
use relay::{McpState, SESSION_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Statement-keyed fake engine with cursor accounting.
#[derive(Default)]
pub struct FakeEngine {
    results: Mutex<HashMap<String, Result<Vec<QueryRow>, String>>>,
    pub opens: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub statements: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn with_rows(self, statement: &str, rows: Value) -> Self {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            _ => panic!("rows must be an array"),
        };
        self.results.lock().unwrap().insert(statement.to_string(), Ok(rows));
        self
    }

    pub fn with_error(self, statement: &str, message: &str) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(statement.to_string(), Err(message.to_string()));
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

struct FakeCursor {
    rows: std::vec::IntoIter<QueryRow>,
    releases: Arc<AtomicUsize>,
}

impl RowCursor for FakeCursor {
    fn next_row(&mut self) -> Option<Result<QueryRow, BackendError>> {
        self.rows.next().map(Ok)
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl QueryEngine for FakeEngine {
    fn open(&self, statement: &str) -> Result<Box<dyn RowCursor + '_>, BackendError> {
        self.statements.lock().unwrap().push(statement.to_string());
        let rows = match self.results.lock().unwrap().get(statement) {
            Some(Ok(rows)) => rows.clone(),
            Some(Err(message)) => return Err(BackendError::new(message.clone())),
            None => Vec::new(),
        };
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeCursor {
            rows: rows.into_iter(),
            releases: Arc::clone(&self.releases),
        }))
    }
}

/// Wrapper so tests keep a handle on the engine they gave away.
pub struct Shared(pub Arc<FakeEngine>);

impl QueryEngine for Shared {
    fn open(&self, statement: &str) -> Result<Box<dyn RowCursor + '_>, BackendError> {
        self.0.open(statement)
    }
}

pub fn server(engine: FakeEngine) -> (Router, Arc<McpState>, Arc<FakeEngine>) {
    let engine = Arc::new(engine);
    let executor = QueryExecutor::new(Arc::new(Shared(Arc::clone(&engine))));
    let state = mcp_state(build_registry(executor).unwrap());
    (app(Arc::clone(&state), "/message"), state, engine)
}

pub struct Reply {
    pub status: StatusCode,
    pub session: Option<String>,
    pub body: Value,
}

pub async fn send(app: &Router, method: Method, uri: &str, session: Option<&str>, body: Body) -> Reply {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream");
    if let Some(id) = session {
        request = request.header(SESSION_HEADER, id);
    }

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Reply {
        status,
        session,
        body,
    }
}

pub async fn post(app: &Router, session: Option<&str>, body: Value) -> Reply {
    send(app, Method::POST, "/message", session, Body::from(body.to_string())).await
}

pub async fn open_session(app: &Router) -> String {
    let reply = post(
        app,
        None,
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0.0" }
            }
        }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.session.expect("initialize should allocate a session")
}

pub fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub fn query(id: i64, arguments: Value) -> Value {
    rpc(id, "tools/call", json!({ "name": "query", "arguments": arguments }))
}
