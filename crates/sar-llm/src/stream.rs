//! Streaming event types and helpers.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::SDKError;
use crate::types::{FinishReason, Response, ToolCall, Usage};

/// Stream of unified events returned by provider adapters.
pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, SDKError>> + Send>>;

/// Stream event type discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    StreamStart,
    TextStart,
    TextDelta,
    TextEnd,
    ToolCallStart,
    ToolCallDelta,
    ToolCallEnd,
    Finish,
    Error,
    ProviderEvent,
}

/// Unified stream event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SDKError>,
}

impl StreamEvent {
    pub fn new(event_type: StreamEventType) -> Self {
        Self {
            event_type,
            delta: None,
            text_id: None,
            tool_call: None,
            finish_reason: None,
            usage: None,
            response: None,
            error: None,
        }
    }

    pub fn text_delta(text_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            text_id: Some(text_id.into()),
            ..Self::new(StreamEventType::TextDelta)
        }
    }

    pub fn tool_call(event_type: StreamEventType, tool_call: ToolCall) -> Self {
        Self {
            tool_call: Some(tool_call),
            ..Self::new(event_type)
        }
    }

    /// Terminal event carrying the fully assembled response.
    pub fn finish(response: Response) -> Self {
        Self {
            finish_reason: Some(response.finish_reason.clone()),
            usage: Some(response.usage.clone()),
            response: Some(response),
            ..Self::new(StreamEventType::Finish)
        }
    }

    pub fn error(error: SDKError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(StreamEventType::Error)
        }
    }

    pub fn is(&self, event_type: StreamEventType) -> bool {
        self.event_type == event_type
    }
}
