//! kuzu-mcp - a Kùzu graph database behind the Model Context Protocol.
//!
//! One tool, `query`, runs Cypher on a single shared connection and returns
//! rows as pretty-printed JSON. One prompt, `generateKuzuCypher`, frames a
//! natural-language question for the client's model.
//!
//! The engine sits behind [`engine::QueryEngine`]; the Kùzu backend is
//! compiled in with the `kuzu` feature.

pub mod engine;
#[cfg(feature = "kuzu")]
pub mod kuzu;
pub mod serve;
pub mod telemetry;
pub mod tools;

pub use engine::{BackendError, QueryEngine, QueryExecutor, QueryRow, RowCursor, SharedConnection};
pub use serve::{app, mcp_state, ServeConfig};
pub use tools::{build_registry, CYPHER_PROMPT, QUERY_TOOL};
