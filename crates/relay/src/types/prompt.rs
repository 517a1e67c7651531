//! Prompt Types
//!
//! Listings for `prompts/list` and rendered messages for `prompts/get`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::content::Content;
use super::Role;

/// A prompt template that the server offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

impl Prompt {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<PromptArgument>) -> Self {
        self.arguments = if arguments.is_empty() {
            None
        } else {
            Some(arguments)
        };
        self
    }
}

/// An argument that a prompt can accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl PromptArgument {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            description: (!description.is_empty()).then_some(description),
            required: Some(required),
        }
    }
}

/// A message in a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: Content,
}

impl PromptMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::text(text),
        }
    }
}

/// Parameters for prompts/get. MCP sends prompt arguments as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// Result of prompts/get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub messages: Vec<PromptMessage>,
}

impl GetPromptResult {
    pub fn new(messages: Vec<PromptMessage>) -> Self {
        Self {
            description: None,
            messages,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Result of prompts/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    pub prompts: Vec<Prompt>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ListPromptsResult {
    /// All prompts, unpaginated.
    pub fn all(prompts: Vec<Prompt>) -> Self {
        Self {
            prompts,
            next_cursor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_listing() {
        let prompt = Prompt::new("generateKuzuCypher", "Turn a question into Cypher")
            .with_arguments(vec![PromptArgument::new("question", "The question", true)]);

        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["name"], "generateKuzuCypher");
        assert_eq!(json["arguments"][0]["name"], "question");
        assert_eq!(json["arguments"][0]["required"], true);
    }

    #[test]
    fn test_prompt_without_arguments_omits_field() {
        let prompt = Prompt::new("noop", "Nothing").with_arguments(vec![]);
        let json = serde_json::to_value(&prompt).unwrap();
        assert!(json.get("arguments").is_none());
    }

    #[test]
    fn test_user_message_shape() {
        let message = PromptMessage::user_text("count nodes");

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["content"]["text"], "count nodes");
    }

    #[test]
    fn test_get_prompt_params_string_arguments() {
        let params: GetPromptParams = serde_json::from_value(serde_json::json!({
            "name": "generateKuzuCypher",
            "arguments": { "question": "how many users?" }
        }))
        .unwrap();

        assert_eq!(params.name, "generateKuzuCypher");
        assert_eq!(params.arguments.unwrap()["question"], "how many users?");
    }
}
