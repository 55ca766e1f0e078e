//! Stream accumulator that builds a Response from StreamEvent sequences.

use std::collections::HashMap;

use crate::stream::{StreamEvent, StreamEventType};
use crate::types::{
    ContentPart, FinishReason, Message, Response, Role, ToolCall, ToolCallData, Usage,
};

/// Identity fields used when no provider response arrives.
#[derive(Clone, Debug, Default)]
pub struct ResponseSeed {
    pub id: String,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    seed: ResponseSeed,
    text_order: Vec<String>,
    text_segments: HashMap<String, String>,
    tool_call_order: Vec<String>,
    tool_calls: HashMap<String, ToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    response: Option<Response>,
}

impl StreamAccumulator {
    pub fn new(seed: ResponseSeed) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn process(&mut self, event: &StreamEvent) {
        if let Some(response) = &event.response {
            self.response = Some(response.clone());
        }

        match event.event_type {
            StreamEventType::TextStart | StreamEventType::TextDelta => {
                let id = event.text_id.as_deref().unwrap_or("default");
                if !self.text_segments.contains_key(id) {
                    self.text_order.push(id.to_string());
                }
                let segment = self.text_segments.entry(id.to_string()).or_default();
                if let Some(delta) = &event.delta {
                    segment.push_str(delta);
                }
            }
            StreamEventType::ToolCallStart
            | StreamEventType::ToolCallDelta
            | StreamEventType::ToolCallEnd => {
                if let Some(tool_call) = &event.tool_call {
                    if !self.tool_calls.contains_key(&tool_call.id) {
                        self.tool_call_order.push(tool_call.id.clone());
                    }
                    self.tool_calls
                        .insert(tool_call.id.clone(), tool_call.clone());
                }
            }
            StreamEventType::Finish => {
                if let Some(reason) = &event.finish_reason {
                    self.finish_reason = Some(reason.clone());
                }
                if let Some(usage) = &event.usage {
                    self.usage = Some(usage.clone());
                }
            }
            _ => {}
        }
    }

    /// Text accumulated so far, across all segments in arrival order.
    pub fn text(&self) -> String {
        self.text_order
            .iter()
            .filter_map(|id| self.text_segments.get(id))
            .map(String::as_str)
            .collect()
    }

    pub fn response(&self) -> Response {
        if let Some(response) = &self.response {
            return response.clone();
        }

        let mut content: Vec<ContentPart> = self
            .text_order
            .iter()
            .filter_map(|id| self.text_segments.get(id))
            .filter(|text| !text.is_empty())
            .map(|text| ContentPart::text(text.clone()))
            .collect();
        content.extend(
            self.tool_call_order
                .iter()
                .filter_map(|id| self.tool_calls.get(id))
                .map(|call| ContentPart::tool_call(ToolCallData::from(call))),
        );

        Response {
            id: self.seed.id.clone(),
            model: self.seed.model.clone(),
            provider: self.seed.provider.clone(),
            message: Message {
                role: Role::Assistant,
                content,
                tool_call_id: None,
            },
            finish_reason: self
                .finish_reason
                .clone()
                .unwrap_or_else(|| FinishReason::new("other")),
            usage: self.usage.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed() -> ResponseSeed {
        ResponseSeed {
            id: "resp".to_string(),
            model: "model".to_string(),
            provider: "provider".to_string(),
        }
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
            raw_arguments: None,
        }
    }

    #[test]
    fn accumulates_text_and_finish() {
        let mut acc = StreamAccumulator::new(seed());
        acc.process(&StreamEvent {
            text_id: Some("t1".to_string()),
            ..StreamEvent::new(StreamEventType::TextStart)
        });
        acc.process(&StreamEvent::text_delta("t1", "Hel"));
        acc.process(&StreamEvent::text_delta("t1", "lo"));
        acc.process(&StreamEvent {
            finish_reason: Some(FinishReason::new("stop")),
            usage: Some(Usage {
                input_tokens: 1,
                output_tokens: 2,
                total_tokens: 3,
            }),
            ..StreamEvent::new(StreamEventType::Finish)
        });

        assert_eq!(acc.text(), "Hello");
        let response = acc.response();
        assert_eq!(response.text(), "Hello");
        assert_eq!(response.finish_reason.reason, "stop");
        assert_eq!(response.usage.total_tokens, 3);
    }

    #[test]
    fn tool_calls_keep_first_seen_order_and_latest_arguments() {
        let mut acc = StreamAccumulator::new(seed());
        acc.process(&StreamEvent::tool_call(
            StreamEventType::ToolCallStart,
            call("call_2", "toggleLayer", json!({})),
        ));
        acc.process(&StreamEvent::tool_call(
            StreamEventType::ToolCallStart,
            call("call_1", "setHeatmap", json!({"aspect": "slope"})),
        ));
        acc.process(&StreamEvent::tool_call(
            StreamEventType::ToolCallEnd,
            call("call_2", "toggleLayer", json!({"layer": "risk", "visible": false})),
        ));

        let tool_calls = acc.response().tool_calls();
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0].id, "call_2");
        assert_eq!(
            tool_calls[0].arguments,
            json!({"layer": "risk", "visible": false})
        );
        assert_eq!(tool_calls[1].id, "call_1");
    }

    #[test]
    fn passthrough_response_takes_priority_over_accumulation() {
        let mut acc = StreamAccumulator::new(seed());
        acc.process(&StreamEvent::text_delta("t1", "partial"));
        let expected = Response {
            id: "provider_resp".to_string(),
            model: "provider_model".to_string(),
            provider: "provider".to_string(),
            message: Message::assistant("direct"),
            finish_reason: FinishReason::new("stop"),
            usage: Usage::default(),
        };
        acc.process(&StreamEvent::finish(expected.clone()));
        assert_eq!(acc.response(), expected);
    }
}
