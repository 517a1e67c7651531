//! MCP Protocol Types
//!
//! The initialize handshake and capability negotiation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ErrorData;

/// The newest MCP protocol version this server speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Versions accepted from clients, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Pick the version to answer with: the client's if supported, else ours.
pub fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == requested)
        .unwrap_or(PROTOCOL_VERSION)
}

/// Server or client implementation info.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    pub name: String,

    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Initialize request params from client.
///
/// Client capabilities are kept opaque; this server never calls back into
/// the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,

    #[serde(default)]
    pub capabilities: Value,

    pub client_info: Implementation,
}

impl InitializeParams {
    pub fn from_params(params: Option<&Value>) -> Result<Self, ErrorData> {
        let params = params
            .cloned()
            .ok_or_else(|| ErrorData::invalid_params("Missing initialize params"))?;
        serde_json::from_value(params)
            .map_err(|e| ErrorData::invalid_params(format!("Invalid initialize params: {}", e)))
    }
}

/// Initialize result from server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,

    pub capabilities: ServerCapabilities,

    pub server_info: Implementation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    pub fn new(
        protocol_version: impl Into<String>,
        server_info: Implementation,
        capabilities: ServerCapabilities,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities,
            server_info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }
}

/// Server capabilities. Only the families this server implements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChanged>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChanged>,
}

impl ServerCapabilities {
    pub fn enable_tools(mut self) -> Self {
        self.tools = Some(ListChanged::default());
        self
    }

    pub fn enable_prompts(mut self) -> Self {
        self.prompts = Some(ListChanged::default());
        self
    }
}

/// Capability body shared by tools and prompts. The registry is frozen at
/// startup, so `listChanged` is always false.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChanged {
    pub list_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_negotiate_version() {
        assert_eq!(negotiate_version("2025-03-26"), "2025-03-26");
        assert_eq!(negotiate_version("1999-01-01"), PROTOCOL_VERSION);
    }

    #[test]
    fn test_initialize_result() {
        let result = InitializeResult::new(
            PROTOCOL_VERSION,
            Implementation::new("kuzu", "1.0.0"),
            ServerCapabilities::default().enable_tools().enable_prompts(),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["serverInfo"]["name"], "kuzu");
        assert_eq!(json["capabilities"]["tools"]["listChanged"], false);
        assert!(json["capabilities"]["prompts"].is_object());
        assert!(json.get("instructions").is_none());
    }

    #[test]
    fn test_initialize_params_capabilities_optional() {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": { "name": "inspector", "version": "0.9.0" }
        });
        let parsed = InitializeParams::from_params(Some(&params)).unwrap();

        assert_eq!(parsed.client_info.name, "inspector");
        assert!(parsed.capabilities.is_null());
    }

    #[test]
    fn test_initialize_params_missing() {
        let err = InitializeParams::from_params(None).unwrap_err();
        assert_eq!(err.code, ErrorData::INVALID_PARAMS);
    }
}
