//! Conversation data model
//!
//! The serde representation follows the Converse wire shape, so a
//! transcript can be sent to the model service as-is:
//!
//! ```text
//! {"role": "assistant", "content": [
//!     {"text": "Let me check."},
//!     {"toolUse": {"toolUseId": "t-1", "name": "get_alerts", "input": {"state": "CA"}}}
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered conversation history for one session
pub type Transcript = Vec<Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

/// A request from the model to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    #[serde(rename = "toolUseId")]
    pub id: String,
    pub name: String,
    #[serde(rename = "input", default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Outcome of executing one [`ToolUse`], correlated by `tool_use_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(rename = "toolUseId")]
    pub tool_use_id: String,
    pub content: Vec<TextContent>,
    pub status: ToolResultStatus,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, texts: Vec<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: texts.into_iter().map(|text| TextContent { text }).collect(),
            status: ToolResultStatus::Success,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![TextContent { text: message.into() }],
            status: ToolResultStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolResultStatus::Error
    }

    /// All text segments joined with newlines
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Create a user message with a single text block
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::Text(text.into())])
    }

    /// Create an assistant message
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message with a single text block
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(vec![ContentBlock::Text(text.into())])
    }

    /// Wrap a tool result in the synthetic user turn that carries it
    pub fn tool_result(result: ToolResult) -> Self {
        Self::new(Role::User, vec![ContentBlock::ToolResult(result)])
    }

    /// Text blocks in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Tool-use blocks in order
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }

    /// Tool-result blocks in order
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    /// Text blocks joined without separators (for display and logging)
    pub fn joined_text(&self) -> String {
        self.texts().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_message_wire_shape() {
        let mut args = Map::new();
        args.insert("state".to_string(), json!("CA"));
        let msg = Message::assistant(vec![
            ContentBlock::Text("Let me check.".to_string()),
            ContentBlock::ToolUse(ToolUse {
                id: "t-1".to_string(),
                name: "get_alerts".to_string(),
                arguments: args,
            }),
        ]);

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "assistant",
                "content": [
                    {"text": "Let me check."},
                    {"toolUse": {"toolUseId": "t-1", "name": "get_alerts", "input": {"state": "CA"}}}
                ]
            })
        );
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let msg = Message::tool_result(ToolResult::error("t-9", "boom"));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"toolResult": {"toolUseId": "t-9", "content": [{"text": "boom"}], "status": "error"}}
                ]
            })
        );
    }

    #[test]
    fn test_tool_use_arguments_must_be_an_object() {
        let bad = serde_json::from_value::<ContentBlock>(json!({
            "toolUse": {"toolUseId": "t-1", "name": "x", "input": [1, 2]}
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_accessors() {
        let msg = Message::assistant(vec![
            ContentBlock::Text("a".into()),
            ContentBlock::ToolUse(ToolUse {
                id: "1".into(),
                name: "n".into(),
                arguments: Map::new(),
            }),
            ContentBlock::Text("b".into()),
        ]);
        assert_eq!(msg.texts().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(msg.joined_text(), "ab");
        assert!(msg.has_tool_use());
        assert!(!Message::user_text("hi").has_tool_use());
    }
}
