//! Kùzu-backed [`QueryEngine`].
//!
//! The database is opened once and kept for the life of the process. All
//! statements share one connection and run one at a time.

use ::kuzu::{Connection, Database, InternalID, NodeVal, RelVal, SystemConfig, Value as KuzuValue};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

use crate::engine::{BackendError, QueryEngine, QueryRow, RowCursor, SharedConnection};

fn backend_error(e: ::kuzu::Error) -> BackendError {
    BackendError::new(e.to_string())
}

pub struct KuzuEngine {
    conn: SharedConnection<Connection<'static>>,
}

impl KuzuEngine {
    /// Open the database at `path` and create the shared connection.
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let db = Database::new(path, SystemConfig::default()).map_err(backend_error)?;
        // Lives until exit; the connection borrows it
        let db: &'static Database = Box::leak(Box::new(db));
        let conn = Connection::new(db).map_err(backend_error)?;

        info!(path = %path.display(), "Kùzu database opened");
        Ok(Self {
            conn: SharedConnection::new(conn),
        })
    }
}

impl QueryEngine for KuzuEngine {
    fn open(&self, statement: &str) -> Result<Box<dyn RowCursor + '_>, BackendError> {
        // The native result is consumed and freed before the connection is handed on
        let (columns, rows) = self.conn.with(|conn| {
            let mut result = conn.query(statement).map_err(backend_error)?;
            let columns = result.get_column_names();
            let rows: VecDeque<Vec<KuzuValue>> = result.by_ref().collect();
            Ok((columns, rows))
        })?;

        Ok(Box::new(KuzuCursor { columns, rows }))
    }
}

struct KuzuCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<KuzuValue>>,
}

impl RowCursor for KuzuCursor {
    fn next_row(&mut self) -> Option<Result<QueryRow, BackendError>> {
        let values = self.rows.pop_front()?;
        let row = self
            .columns
            .iter()
            .cloned()
            .zip(values.iter().map(to_json))
            .collect();
        Some(Ok(row))
    }

    fn release(&mut self) {
        self.rows.clear();
    }
}

fn properties(target: &mut Map<String, Value>, props: &[(String, KuzuValue)]) {
    for (key, value) in props {
        target.insert(key.clone(), to_json(value));
    }
}

fn internal_id(id: &InternalID) -> Value {
    json!({ "offset": id.offset, "table": id.table_id })
}

fn node_json(node: &NodeVal) -> Value {
    let mut obj = Map::new();
    obj.insert("_label".into(), Value::String(node.get_label_name().clone()));
    obj.insert("_id".into(), internal_id(node.get_node_id()));
    properties(&mut obj, node.get_properties());
    Value::Object(obj)
}

fn rel_json(rel: &RelVal) -> Value {
    let mut obj = Map::new();
    obj.insert("_label".into(), Value::String(rel.get_label_name().clone()));
    obj.insert("_src".into(), internal_id(rel.get_src_node()));
    obj.insert("_dst".into(), internal_id(rel.get_dst_node()));
    properties(&mut obj, rel.get_properties());
    Value::Object(obj)
}

/// Map an engine value to JSON. Temporal and other exotic types fall back to
/// their display form.
pub(crate) fn to_json(value: &KuzuValue) -> Value {
    match value {
        KuzuValue::Null(_) => Value::Null,
        KuzuValue::Bool(b) => Value::Bool(*b),
        KuzuValue::Int8(n) => json!(n),
        KuzuValue::Int16(n) => json!(n),
        KuzuValue::Int32(n) => json!(n),
        KuzuValue::Int64(n) => json!(n),
        KuzuValue::UInt8(n) => json!(n),
        KuzuValue::UInt16(n) => json!(n),
        KuzuValue::UInt32(n) => json!(n),
        KuzuValue::UInt64(n) => json!(n),
        KuzuValue::Float(f) => json!(f),
        KuzuValue::Double(f) => json!(f),
        KuzuValue::String(s) => Value::String(s.clone()),
        KuzuValue::List(_, items) | KuzuValue::Array(_, items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        KuzuValue::Struct(fields) => {
            let mut obj = Map::new();
            properties(&mut obj, fields);
            Value::Object(obj)
        }
        KuzuValue::Node(node) => node_json(node),
        KuzuValue::Rel(rel) => rel_json(rel),
        KuzuValue::RecursiveRel { nodes, rels } => json!({
            "_nodes": nodes.iter().map(node_json).collect::<Vec<_>>(),
            "_rels": rels.iter().map(rel_json).collect::<Vec<_>>(),
        }),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execute_blocking;

    fn engine() -> (tempfile::TempDir, KuzuEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = KuzuEngine::open(&dir.path().join("graph")).unwrap();
        (dir, engine)
    }

    #[test]
    fn test_scalar_return() {
        let (_dir, engine) = engine();
        let rows = execute_blocking(&engine, "RETURN 1 AS x").unwrap();
        assert_eq!(Value::Array(rows.into_iter().map(Value::Object).collect()), json!([{"x": 1}]));
    }

    #[test]
    fn test_nodes_and_lists() {
        let (_dir, engine) = engine();
        execute_blocking(
            &engine,
            "CREATE NODE TABLE Person(name STRING, age INT64, PRIMARY KEY(name))",
        )
        .unwrap();
        execute_blocking(&engine, "CREATE (:Person {name: 'Ada', age: 36})").unwrap();

        let rows = execute_blocking(&engine, "MATCH (p:Person) RETURN p, [1, 2] AS l").unwrap();
        assert_eq!(rows.len(), 1);
        let node = &rows[0]["p"];
        assert_eq!(node["_label"], "Person");
        assert_eq!(node["name"], "Ada");
        assert_eq!(node["age"], 36);
        assert!(node["_id"]["offset"].is_u64());
        assert_eq!(rows[0]["l"], json!([1, 2]));
    }

    fn knows_graph() -> (tempfile::TempDir, KuzuEngine) {
        let (dir, engine) = engine();
        for statement in [
            "CREATE NODE TABLE Person(name STRING, PRIMARY KEY(name))",
            "CREATE REL TABLE Knows(FROM Person TO Person, since INT64)",
            "CREATE (:Person {name: 'Ada'})",
            "CREATE (:Person {name: 'Grace'})",
            "MATCH (a:Person {name: 'Ada'}), (b:Person {name: 'Grace'}) CREATE (a)-[:Knows {since: 1843}]->(b)",
        ] {
            execute_blocking(&engine, statement).unwrap();
        }
        (dir, engine)
    }

    #[test]
    fn test_rel_carries_endpoints() {
        let (_dir, engine) = knows_graph();
        let rows = execute_blocking(
            &engine,
            "MATCH (a:Person)-[r:Knows]->(b:Person) RETURN a, r, b",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);

        let rel = &rows[0]["r"];
        assert_eq!(rel["_label"], "Knows");
        assert_eq!(rel["since"], 1843);
        assert_eq!(rel["_src"], rows[0]["a"]["_id"]);
        assert_eq!(rel["_dst"], rows[0]["b"]["_id"]);
    }

    #[test]
    fn test_path_lists_nodes_and_rels() {
        let (_dir, engine) = knows_graph();
        let rows = execute_blocking(
            &engine,
            "MATCH p = (:Person {name: 'Ada'})-[:Knows*1..1]->(:Person) RETURN p",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);

        let path = &rows[0]["p"];
        let nodes = path["_nodes"].as_array().unwrap();
        let rels = path["_rels"].as_array().unwrap();
        assert!(nodes.iter().all(|n| n["_label"] == "Person"));
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0]["_label"], "Knows");
        assert_eq!(rels[0]["since"], 1843);
    }

    #[test]
    fn test_engine_error_verbatim() {
        let (_dir, engine) = engine();
        let err = execute_blocking(&engine, "MATCH (n:Missing) RETURN n").unwrap_err();
        assert!(!err.message.is_empty());
        assert!(err.message.contains("Missing"));
    }

    #[test]
    fn test_null_and_string() {
        let (_dir, engine) = engine();
        let rows = execute_blocking(&engine, "RETURN NULL AS a, 'hi' AS b").unwrap();
        assert_eq!(rows[0]["a"], Value::Null);
        assert_eq!(rows[0]["b"], "hi");
    }
}
