//! Tool and prompt registry
//!
//! Definitions are registered once at startup through [`RegistryBuilder`],
//! then frozen into a [`Registry`] shared read-only by every request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{InputSchema, ValidatedArgs};
use crate::types::prompt::{Prompt, PromptMessage};
use crate::types::tool::{CallToolResult, Tool, ToolAnnotations};

/// Failure inside a tool or prompt handler.
///
/// For tools this becomes an `isError` result; for prompts a JSON-RPC
/// internal error.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("prompt '{0}' is already registered")]
    DuplicatePrompt(String),
}

/// Executes one tool call with already-validated arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn call(&self, args: ValidatedArgs) -> Result<CallToolResult, HandlerError>;
}

/// Renders one prompt with already-validated arguments.
#[async_trait]
pub trait PromptHandler: Send + Sync + 'static {
    async fn render(&self, args: ValidatedArgs) -> Result<Vec<PromptMessage>, HandlerError>;
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: InputSchema,
    pub annotations: Option<ToolAnnotations>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        handler: impl ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            annotations: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    /// Listing entry for `tools/list`.
    pub fn to_tool(&self) -> Tool {
        let tool = Tool::new(&self.name, &self.description, self.schema.to_tool_schema());
        match &self.annotations {
            Some(annotations) => tool.with_annotations(annotations.clone()),
            None => tool,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

pub struct PromptDefinition {
    pub name: String,
    pub description: String,
    pub schema: InputSchema,
    handler: Arc<dyn PromptHandler>,
}

impl PromptDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        handler: impl PromptHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &Arc<dyn PromptHandler> {
        &self.handler
    }

    /// Listing entry for `prompts/list`.
    pub fn to_prompt(&self) -> Prompt {
        Prompt::new(&self.name, &self.description).with_arguments(self.schema.to_prompt_arguments())
    }
}

impl std::fmt::Debug for PromptDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptDefinition")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Anything the builder accepts.
#[derive(Debug)]
pub enum Definition {
    Tool(ToolDefinition),
    Prompt(PromptDefinition),
}

impl From<ToolDefinition> for Definition {
    fn from(def: ToolDefinition) -> Self {
        Definition::Tool(def)
    }
}

impl From<PromptDefinition> for Definition {
    fn from(def: PromptDefinition) -> Self {
        Definition::Prompt(def)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tools: Vec<ToolDefinition>,
    prompts: Vec<PromptDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Names are unique per kind; a repeat is an error.
    pub fn register(&mut self, definition: impl Into<Definition>) -> Result<&mut Self, RegistryError> {
        match definition.into() {
            Definition::Tool(def) => {
                if self.tools.iter().any(|t| t.name == def.name) {
                    return Err(RegistryError::DuplicateTool(def.name));
                }
                tracing::debug!(tool = %def.name, "registered tool");
                self.tools.push(def);
            }
            Definition::Prompt(def) => {
                if self.prompts.iter().any(|p| p.name == def.name) {
                    return Err(RegistryError::DuplicatePrompt(def.name));
                }
                tracing::debug!(prompt = %def.name, "registered prompt");
                self.prompts.push(def);
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Registry {
        let tool_index = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let prompt_index = self
            .prompts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        Registry {
            tools: self.tools,
            prompts: self.prompts,
            tool_index,
            prompt_index,
        }
    }
}

/// Frozen set of tools and prompts, in registration order.
#[derive(Debug)]
pub struct Registry {
    tools: Vec<ToolDefinition>,
    prompts: Vec<PromptDefinition>,
    tool_index: HashMap<String, usize>,
    prompt_index: HashMap<String, usize>,
}

impl Registry {
    pub fn resolve_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    pub fn resolve_prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompt_index.get(name).map(|&i| &self.prompts[i])
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn prompts(&self) -> &[PromptDefinition] {
        &self.prompts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamType;

    struct Constant(&'static str);

    #[async_trait]
    impl ToolHandler for Constant {
        async fn call(&self, _args: ValidatedArgs) -> Result<CallToolResult, HandlerError> {
            Ok(CallToolResult::text(self.0))
        }
    }

    #[async_trait]
    impl PromptHandler for Constant {
        async fn render(&self, _args: ValidatedArgs) -> Result<Vec<PromptMessage>, HandlerError> {
            Ok(vec![PromptMessage::user_text(self.0)])
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "test tool",
            InputSchema::new().required("x", ParamType::String, ""),
            Constant("ok"),
        )
    }

    #[test]
    fn test_resolve_registered() {
        let mut builder = RegistryBuilder::new();
        builder.register(tool("query")).unwrap();
        builder
            .register(PromptDefinition::new("ask", "", InputSchema::new(), Constant("q")))
            .unwrap();
        let registry = builder.build();

        assert!(registry.resolve_tool("query").is_some());
        assert!(registry.resolve_tool("ask").is_none());
        assert!(registry.resolve_prompt("ask").is_some());
        assert!(registry.resolve_prompt("missing").is_none());
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(tool("query")).unwrap();
        let err = builder.register(tool("query")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("query".to_string()));
    }

    #[test]
    fn test_duplicate_prompt_rejected() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(PromptDefinition::new("ask", "", InputSchema::new(), Constant("a")))
            .unwrap();
        let err = builder
            .register(PromptDefinition::new("ask", "other", InputSchema::new(), Constant("b")))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicatePrompt("ask".to_string()));
        assert_eq!(err.to_string(), "prompt 'ask' is already registered");

        // The first registration survives
        let registry = builder.build();
        assert_eq!(registry.prompts().len(), 1);
        assert_eq!(registry.resolve_prompt("ask").unwrap().description, "");
    }

    #[test]
    fn test_tool_and_prompt_may_share_a_name() {
        let mut builder = RegistryBuilder::new();
        builder.register(tool("same")).unwrap();
        builder
            .register(PromptDefinition::new("same", "", InputSchema::new(), Constant("q")))
            .unwrap();
        let registry = builder.build();
        assert_eq!(registry.tools().len(), 1);
        assert_eq!(registry.prompts().len(), 1);
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(tool("zeta"))
            .unwrap()
            .register(tool("alpha"))
            .unwrap();
        let registry = builder.build();

        let names: Vec<_> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_listing_entry() {
        let json = serde_json::to_value(tool("query").to_tool()).unwrap();
        assert_eq!(json["name"], "query");
        assert_eq!(json["inputSchema"]["required"][0], "x");
    }

    #[tokio::test]
    async fn test_handler_invocation() {
        let def = tool("query");
        let result = def.handler().call(ValidatedArgs::default()).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("ok"));
    }
}
