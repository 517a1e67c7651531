//! The `query` tool and the `generateKuzuCypher` prompt.

use async_trait::async_trait;
use relay::{
    CallToolResult, HandlerError, InputSchema, ParamType, PromptDefinition, PromptHandler,
    PromptMessage, Registry, RegistryBuilder, RegistryError, ToolAnnotations, ToolDefinition,
    ToolHandler, ValidatedArgs,
};
use tracing::debug;

use crate::engine::{BackendError, QueryExecutor, QueryRow};

pub const QUERY_TOOL: &str = "query";
pub const CYPHER_PROMPT: &str = "generateKuzuCypher";

impl From<BackendError> for HandlerError {
    fn from(e: BackendError) -> Self {
        HandlerError::Failed(e.message)
    }
}

/// Pretty-print rows as a JSON array with 2-space indent.
pub fn render_rows(rows: &[QueryRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}

/// Runs a Cypher statement and returns its rows as JSON text.
pub struct QueryTool {
    executor: QueryExecutor,
}

impl QueryTool {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for QueryTool {
    async fn call(&self, args: ValidatedArgs) -> Result<CallToolResult, HandlerError> {
        let cypher = args
            .str("cypher")
            .ok_or_else(|| HandlerError::MissingArgument("cypher".to_string()))?;
        debug!(cypher, "Executing Cypher");

        let rows = self.executor.execute(cypher).await?;
        Ok(CallToolResult::text(render_rows(&rows)?))
    }
}

/// Hands the question back as a single user message.
pub struct CypherPrompt;

#[async_trait]
impl PromptHandler for CypherPrompt {
    async fn render(&self, args: ValidatedArgs) -> Result<Vec<PromptMessage>, HandlerError> {
        let question = args
            .str("question")
            .ok_or_else(|| HandlerError::MissingArgument("question".to_string()))?;
        Ok(vec![PromptMessage::user_text(question)])
    }
}

/// Register the server's tool and prompt.
pub fn build_registry(executor: QueryExecutor) -> Result<Registry, RegistryError> {
    let mut builder = RegistryBuilder::new();
    builder
        .register(
            ToolDefinition::new(
                QUERY_TOOL,
                "Run a Cypher query on the Kùzu database",
                InputSchema::new().required("cypher", ParamType::String, "Cypher statement to execute"),
                QueryTool::new(executor),
            )
            .with_annotations(
                ToolAnnotations::default()
                    .with_title("Kùzu Cypher query")
                    .with_destructive(true)
                    .with_open_world(false),
            ),
        )?
        .register(PromptDefinition::new(
            CYPHER_PROMPT,
            "Generate a Kùzu Cypher query from a natural-language question",
            InputSchema::new().required("question", ParamType::String, "What to ask of the graph"),
            CypherPrompt,
        ))?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{QueryEngine, RowCursor};
    use relay::{Content, Validation};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves fixed rows and tracks how many cursors are open at once.
    #[derive(Default)]
    struct Fake {
        rows: Vec<QueryRow>,
        fail: Option<String>,
        open_now: Arc<AtomicUsize>,
        max_open: Arc<AtomicUsize>,
    }

    struct Cursor {
        rows: std::vec::IntoIter<QueryRow>,
        open_now: Arc<AtomicUsize>,
    }

    impl RowCursor for Cursor {
        fn next_row(&mut self) -> Option<Result<QueryRow, BackendError>> {
            self.rows.next().map(Ok)
        }

        fn release(&mut self) {
            self.open_now.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl QueryEngine for Fake {
        fn open(&self, _statement: &str) -> Result<Box<dyn RowCursor + '_>, BackendError> {
            if let Some(message) = &self.fail {
                return Err(BackendError::new(message.clone()));
            }
            let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_open.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(Cursor {
                rows: self.rows.clone().into_iter(),
                open_now: Arc::clone(&self.open_now),
            }))
        }
    }

    fn tool(fake: Fake) -> QueryTool {
        QueryTool::new(QueryExecutor::new(Arc::new(fake)))
    }

    fn args(schema: &InputSchema, value: Value) -> ValidatedArgs {
        match schema.validate(value.as_object().unwrap()) {
            Validation::Valid(args) => args,
            Validation::Invalid(reason) => panic!("unexpected invalid args: {}", reason),
        }
    }

    fn query_args(cypher: &str) -> ValidatedArgs {
        let schema = InputSchema::new().required("cypher", ParamType::String, "");
        args(&schema, json!({ "cypher": cypher }))
    }

    fn text(result: &CallToolResult) -> &str {
        match &result.content[0] {
            Content::Text { text } => text,
        }
    }

    #[test]
    fn test_render_rows() {
        assert_eq!(render_rows(&[]).unwrap(), "[]");

        let row = json!({"x": 1}).as_object().unwrap().clone();
        assert_eq!(render_rows(&[row]).unwrap(), "[\n  {\n    \"x\": 1\n  }\n]");
    }

    #[test]
    fn test_render_keeps_column_order() {
        let row = json!({"b": 1, "a": 2}).as_object().unwrap().clone();
        assert_eq!(
            render_rows(&[row]).unwrap(),
            "[\n  {\n    \"b\": 1,\n    \"a\": 2\n  }\n]"
        );
    }

    #[tokio::test]
    async fn test_query_tool_renders_rows() {
        let fake = Fake {
            rows: vec![json!({"x": 1}).as_object().unwrap().clone()],
            ..Default::default()
        };
        let result = tool(fake).call(query_args("RETURN 1 AS x")).await.unwrap();

        assert!(!result.is_error);
        assert_eq!(text(&result), "[\n  {\n    \"x\": 1\n  }\n]");
    }

    #[tokio::test]
    async fn test_query_tool_engine_error() {
        let fake = Fake {
            fail: Some("Binder exception: Table Missing does not exist.".into()),
            ..Default::default()
        };
        let err = tool(fake).call(query_args("MATCH (n:Missing) RETURN n")).await.unwrap_err();
        assert_eq!(err.to_string(), "Binder exception: Table Missing does not exist.");
    }

    #[tokio::test]
    async fn test_sequential_calls_hold_one_cursor() {
        let fake = Fake::default();
        let max_open = Arc::clone(&fake.max_open);
        let open_now = Arc::clone(&fake.open_now);
        let tool = tool(fake);

        tool.call(query_args("RETURN 1")).await.unwrap();
        tool.call(query_args("RETURN 2")).await.unwrap();

        assert_eq!(max_open.load(Ordering::SeqCst), 1);
        assert_eq!(open_now.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prompt_echoes_question() {
        let schema = InputSchema::new().required("question", ParamType::String, "");
        let messages = CypherPrompt
            .render(args(&schema, json!({ "question": "count nodes" })))
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        let value = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"]["text"], "count nodes");
    }

    #[test]
    fn test_registry_contents() {
        let registry = build_registry(QueryExecutor::new(Arc::new(Fake::default()))).unwrap();

        let tool = registry.resolve_tool(QUERY_TOOL).unwrap();
        assert_eq!(tool.schema.params()[0].name, "cypher");
        assert!(tool.schema.params()[0].required);
        assert!(registry.resolve_prompt(CYPHER_PROMPT).is_some());
        assert_eq!(registry.tools().len(), 1);
        assert_eq!(registry.prompts().len(), 1);
    }
}
