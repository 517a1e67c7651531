//! MCP Protocol Dispatch
//!
//! Routes JSON-RPC methods to the registry.
//!
//! Implements OpenTelemetry JSON-RPC semantic conventions for observability.
//! See: https://opentelemetry.io/docs/specs/semconv/rpc/json-rpc/

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::registry::Registry;
use crate::schema::Validation;
use crate::types::error::ErrorData;
use crate::types::jsonrpc::JsonRpcMessage;
use crate::types::prompt::{GetPromptParams, GetPromptResult, ListPromptsResult};
use crate::types::protocol::{
    negotiate_version, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
use crate::types::tool::{CallToolParams, CallToolResult, ListToolsResult};

/// Where a request is in its lifetime. Recorded as `mcp.stage` on the
/// dispatch span.
///
/// `Received -> Validated -> Invoking -> Completed`, or `Errored` from any
/// stage before `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Invoking,
    Completed,
    Errored,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Invoking => "invoking",
            Stage::Completed => "completed",
            Stage::Errored => "errored",
        }
    }

    fn record(self) {
        tracing::Span::current().record("mcp.stage", self.as_str());
    }
}

/// Stateless request dispatcher over a frozen [`Registry`].
///
/// Holds nothing mutable, so any number of requests may dispatch at once.
pub struct Dispatcher {
    registry: Registry,
    server_info: Implementation,
    instructions: Option<String>,
}

impl Dispatcher {
    pub fn new(registry: Registry, server_info: Implementation) -> Self {
        Self {
            registry,
            server_info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn capabilities(&self) -> ServerCapabilities {
        let mut caps = ServerCapabilities::default().enable_tools();
        if !self.registry.prompts().is_empty() {
            caps = caps.enable_prompts();
        }
        caps
    }

    /// Dispatch one message and produce the body of its response envelope.
    ///
    /// Creates an OpenTelemetry span following JSON-RPC semantic conventions:
    /// - `rpc.system` = "jsonrpc"
    /// - `rpc.method` = the JSON-RPC method name
    /// - `rpc.jsonrpc.request_id` = the request ID (if present)
    /// - `mcp.session_id` = the MCP session identifier
    /// - `mcp.stage` = final [`Stage`]
    ///
    /// Notifications return `Ok(Value::Null)`; the transport sends no body for them.
    pub async fn dispatch(
        &self,
        session_id: &str,
        message: &JsonRpcMessage,
    ) -> Result<Value, ErrorData> {
        let request_id_str = message
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();

        let span = tracing::info_span!(
            "mcp.dispatch",
            rpc.system = "jsonrpc",
            rpc.method = %message.method,
            rpc.jsonrpc.version = "2.0",
            rpc.jsonrpc.request_id = %request_id_str,
            mcp.session_id = %session_id,
            mcp.stage = Stage::Received.as_str(),
            // Error fields - recorded on failure
            error.type = tracing::field::Empty,
            rpc.jsonrpc.error_code = tracing::field::Empty,
            rpc.jsonrpc.error_message = tracing::field::Empty,
        );

        async {
            let result = self.dispatch_inner(message).await;

            match &result {
                Ok(_) => Stage::Completed.record(),
                Err(error) => {
                    Stage::Errored.record();
                    record_error_on_span(error);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch_inner(&self, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        if message.is_notification() {
            tracing::debug!(method = %message.method, "notification received");
            return Ok(Value::Null);
        }

        match message.method.as_str() {
            // Lifecycle
            "initialize" => self.handle_initialize(message),
            "ping" => Ok(serde_json::json!({})),

            // Tools
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(message).await,

            // Prompts
            "prompts/list" => self.handle_list_prompts(),
            "prompts/get" => self.handle_get_prompt(message).await,

            _ => Err(ErrorData::method_not_found(&message.method)),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params = InitializeParams::from_params(request.params.as_ref())?;
        Stage::Validated.record();

        let version = negotiate_version(&params.protocol_version);
        tracing::info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = %version,
            "client initialized"
        );

        let result = InitializeResult::new(version, self.server_info.clone(), self.capabilities())
            .with_instructions(self.instructions.clone());

        to_result(&result)
    }

    fn handle_list_tools(&self) -> Result<Value, ErrorData> {
        let tools = self.registry.tools().iter().map(|t| t.to_tool()).collect();
        to_result(&ListToolsResult::all(tools))
    }

    async fn handle_call_tool(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: CallToolParams = parse_params(request, "call")?;

        let definition = self
            .registry
            .resolve_tool(&params.name)
            .ok_or_else(|| ErrorData::tool_not_found(&params.name))?;

        let arguments = params.arguments.unwrap_or_default();
        let args = match definition.schema.validate(&arguments) {
            Validation::Valid(args) => args,
            Validation::Invalid(reason) => return Err(ErrorData::invalid_params(reason)),
        };
        Stage::Validated.record();

        let tool_span = tracing::info_span!(
            "mcp.tool.call",
            mcp.tool.name = %params.name,
            mcp.tool.is_error = tracing::field::Empty,
        );

        Stage::Invoking.record();
        let handler = definition.handler().clone();
        let outcome = AssertUnwindSafe(handler.call(args))
            .catch_unwind()
            .instrument(tool_span.clone())
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(parent: &tool_span, tool = %params.name, error = %err, "tool failed");
                CallToolResult::error(err.to_string())
            }
            Err(_) => {
                tracing::error!(parent: &tool_span, tool = %params.name, "tool handler panicked");
                return Err(ErrorData::internal_error(format!(
                    "Tool '{}' failed unexpectedly",
                    params.name
                )));
            }
        };
        tool_span.record("mcp.tool.is_error", result.is_error);

        to_result(&result)
    }

    fn handle_list_prompts(&self) -> Result<Value, ErrorData> {
        let prompts = self.registry.prompts().iter().map(|p| p.to_prompt()).collect();
        to_result(&ListPromptsResult::all(prompts))
    }

    async fn handle_get_prompt(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: GetPromptParams = parse_params(request, "get")?;

        let definition = self
            .registry
            .resolve_prompt(&params.name)
            .ok_or_else(|| ErrorData::prompt_not_found(&params.name))?;

        let arguments = params.arguments.unwrap_or_default();
        let args = match definition.schema.validate_strings(&arguments) {
            Validation::Valid(args) => args,
            Validation::Invalid(reason) => return Err(ErrorData::invalid_params(reason)),
        };
        Stage::Validated.record();

        let prompt_span = tracing::info_span!(
            "mcp.prompt.get",
            mcp.prompt.name = %params.name,
        );

        Stage::Invoking.record();
        let handler = definition.handler().clone();
        let outcome = AssertUnwindSafe(handler.render(args))
            .catch_unwind()
            .instrument(prompt_span.clone())
            .await;

        let messages = match outcome {
            Ok(Ok(messages)) => messages,
            Ok(Err(err)) => return Err(ErrorData::internal_error(err.to_string())),
            Err(_) => {
                tracing::error!(parent: &prompt_span, prompt = %params.name, "prompt handler panicked");
                return Err(ErrorData::internal_error(format!(
                    "Prompt '{}' failed unexpectedly",
                    params.name
                )));
            }
        };

        to_result(&GetPromptResult::new(messages).with_description(definition.description.clone()))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    request: &JsonRpcMessage,
    what: &str,
) -> Result<T, ErrorData> {
    request
        .params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| ErrorData::invalid_params(format!("Invalid {} params: {}", what, e)))?
        .ok_or_else(|| ErrorData::invalid_params(format!("Missing {} params", what)))
}

fn to_result<T: Serialize>(result: &T) -> Result<Value, ErrorData> {
    serde_json::to_value(result)
        .map_err(|e| ErrorData::internal_error(format!("Failed to serialize result: {}", e)))
}

/// Record JSON-RPC error on the current span following OTEL conventions.
fn record_error_on_span(error: &ErrorData) {
    let span = tracing::Span::current();
    span.record("error.type", error.error_type());
    span.record("rpc.jsonrpc.error_code", error.code);
    span.record("rpc.jsonrpc.error_message", error.message.as_str());
}
