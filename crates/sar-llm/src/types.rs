//! Core data model types (messages, content parts, requests, responses).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::{Add, AddAssign};

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single part of a message body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCallData),
    ToolResult(ToolResultData),
}

impl ContentPart {
    pub fn text(content: impl Into<String>) -> Self {
        ContentPart::Text {
            text: content.into(),
        }
    }

    pub fn tool_call(data: ToolCallData) -> Self {
        ContentPart::ToolCall(data)
    }

    pub fn tool_result(data: ToolResultData) -> Self {
        ContentPart::ToolResult(data)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The fundamental unit of conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::text(content)],
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, content)
    }

    /// An assistant message with no parts yet; filled while streaming.
    pub fn empty_assistant() -> Self {
        Self {
            role: Role::Assistant,
            content: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let tool_call_id = tool_call_id.into();
        Self {
            role: Role::Tool,
            content: vec![ContentPart::tool_result(ToolResultData {
                tool_call_id: tool_call_id.clone(),
                content: content.into(),
                is_error,
            })],
            tool_call_id: Some(tool_call_id),
        }
    }

    /// Concatenate all text content parts (empty if none).
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Append streamed text, extending the trailing text part when there is one.
    pub fn push_text(&mut self, delta: &str) {
        if let Some(ContentPart::Text { text }) = self.content.last_mut() {
            text.push_str(delta);
        } else {
            self.content.push(ContentPart::text(delta));
        }
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(data) => Some(ToolCall::from(data)),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Model-initiated tool call data within an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool execution result, linked back to the tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultData {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// Tool definition for requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool choice policy for a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoice {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self {
            mode: "auto".to_string(),
            tool_name: None,
        }
    }

    pub fn none() -> Self {
        Self {
            mode: "none".to_string(),
            tool_name: None,
        }
    }

    pub fn required() -> Self {
        Self {
            mode: "required".to_string(),
            tool_name: None,
        }
    }

    pub fn named(tool_name: impl Into<String>) -> Self {
        Self {
            mode: "named".to_string(),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Request input for complete() and stream().
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

impl Request {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            provider: None,
            tools: None,
            tool_choice: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Response from a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub provider: String,
    pub message: Message,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    pub fn text(&self) -> String {
        self.message.text()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.message.tool_calls()
    }
}

/// Unified finish reason with provider-specific raw detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishReason {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl FinishReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: None,
        }
    }
}

/// Token usage summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = self.clone() + rhs;
    }
}

/// Canonical tool call extracted from a response.
///
/// Providers sometimes deliver arguments as a JSON-encoded string; those are
/// kept verbatim in `raw_arguments` and `arguments` is left as an empty object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
}

impl ToolCall {
    /// Resolve the arguments, parsing `raw_arguments` when present.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        match &self.raw_arguments {
            Some(raw) if raw.trim().is_empty() => Ok(Value::Object(Default::default())),
            Some(raw) => serde_json::from_str(raw),
            None => Ok(self.arguments.clone()),
        }
    }
}

impl From<&ToolCallData> for ToolCall {
    fn from(value: &ToolCallData) -> Self {
        match &value.arguments {
            Value::String(raw) => ToolCall {
                id: value.id.clone(),
                name: value.name.clone(),
                arguments: Value::Object(Default::default()),
                raw_arguments: Some(raw.clone()),
            },
            other => ToolCall {
                id: value.id.clone(),
                name: value.name.clone(),
                arguments: other.clone(),
                raw_arguments: None,
            },
        }
    }
}

impl From<&ToolCall> for ToolCallData {
    fn from(value: &ToolCall) -> Self {
        ToolCallData {
            id: value.id.clone(),
            name: value.name.clone(),
            arguments: match &value.raw_arguments {
                Some(raw) => Value::String(raw.clone()),
                None => value.arguments.clone(),
            },
        }
    }
}
