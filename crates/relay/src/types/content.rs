//! Content Types
//!
//! Content blocks carried by tool results and prompt messages. Only text
//! blocks are produced by this server; the enum stays tagged so clients see
//! the `{"type": "text", ...}` shape they expect.

use serde::{Deserialize, Serialize};

/// Content block in a message or tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Borrow the text of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
        }
    }
}
