//! MCP Protocol Types
//!
//! The subset of the MCP 2025-06-18 wire types this server speaks:
//!
//! - `jsonrpc` - JSON-RPC 2.0 envelopes and frame decoding
//! - `error` - error data with standard error codes
//! - `protocol` - initialize handshake and capability negotiation
//! - `tool` - tool listings and call results
//! - `prompt` - prompt listings and rendered messages
//! - `content` - content blocks carried by tool results and prompt messages

pub mod content;
pub mod error;
pub mod jsonrpc;
pub mod prompt;
pub mod protocol;
pub mod tool;

use serde::{Deserialize, Serialize};

/// Role in a conversation - user or assistant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
