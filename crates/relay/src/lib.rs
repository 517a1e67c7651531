//! relay - MCP (Model Context Protocol) server library
//!
//! Bridges JSON-RPC 2.0 requests arriving over the MCP Streamable HTTP
//! transport to a fixed set of tools and prompts registered at startup.
//!
//! # Pieces
//!
//! - **schema**: tagged input schemas (`name -> primitive type`) and their validator
//! - **registry**: tool and prompt definitions, frozen after startup
//! - **protocol**: the request dispatcher (`initialize`, `tools/*`, `prompts/*`)
//! - **session**: per-client session state and lifecycle
//! - **transport**: axum handlers for POST/GET/DELETE on one endpoint, plus
//!   the legacy `/sse` + `/messages/` pair
//!
//! # Example
//!
//! ```rust,ignore
//! use relay::{CallToolResult, HandlerError, InputSchema, ParamType, RegistryBuilder,
//!             ToolDefinition, ToolHandler, ValidatedArgs};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ToolHandler for Echo {
//!     async fn call(&self, args: ValidatedArgs) -> Result<CallToolResult, HandlerError> {
//!         Ok(CallToolResult::text(args.str("text").unwrap_or_default()))
//!     }
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! builder.register(ToolDefinition::new(
//!     "echo",
//!     "Echo the input",
//!     InputSchema::new().required("text", ParamType::String, "Text to echo"),
//!     Echo,
//! ))?;
//!
//! let dispatcher = relay::Dispatcher::new(builder.build(), relay::Implementation::new("echo", "0.1.0"));
//! let state = std::sync::Arc::new(relay::McpState::new(dispatcher));
//! let app = axum::Router::new().nest("/message", relay::router(state));
//! ```

pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types at crate root
pub use types::content::Content;
pub use types::error::ErrorData;
pub use types::jsonrpc::{Frame, JsonRpcMessage, JsonRpcReply, RequestId};
pub use types::prompt::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
pub use types::protocol::{Implementation, ServerCapabilities};
pub use types::tool::{CallToolResult, Tool, ToolAnnotations, ToolSchema};
pub use types::Role;

pub use registry::{
    Definition, HandlerError, PromptDefinition, PromptHandler, Registry, RegistryBuilder,
    RegistryError, ToolDefinition, ToolHandler,
};
pub use schema::{InputSchema, ParamSpec, ParamType, ValidatedArgs, Validation};

pub use protocol::{Dispatcher, Stage};

pub use session::{
    spawn_cleanup_task, InMemorySessionStore, Session, SessionState, SessionStats, SessionStore,
    SessionTicket,
};

pub use transport::{legacy_router, router, McpState, SESSION_HEADER};
