//! Adapter for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Gemini exposes such an endpoint, which is the default target.

use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::{
    AdapterTimeout, ErrorInfo, HttpErrorClassification, ProviderError, ProviderErrorKind,
    SDKError, classify_message, map_http_status,
};
use crate::provider::{ProviderAdapter, ProviderFactory, register_provider_factory};
use crate::stream::{StreamEvent, StreamEventStream, StreamEventType};
use crate::types::{
    ContentPart, FinishReason, Message, Request, Response, Role, ToolCall, ToolCallData,
    ToolChoice, Usage,
};
use crate::utils::{SseEvent, SseParser};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PROVIDER_NAME: &str = "gemini";

const TEXT_ID: &str = "text_0";

#[derive(Clone, Debug)]
pub struct ChatCompletionsConfig {
    pub api_key: String,
    pub base_url: String,
    pub provider_name: String,
    pub timeout: AdapterTimeout,
}

impl ChatCompletionsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            timeout: AdapterTimeout::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads `GEMINI_API_KEY` (falling back to `SAR_LLM_API_KEY`) and an
    /// optional `SAR_LLM_BASE_URL`.
    pub fn from_env() -> Option<Self> {
        let api_key = ["GEMINI_API_KEY", "SAR_LLM_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|value| !value.is_empty()))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("SAR_LLM_BASE_URL")
            && !base_url.is_empty()
        {
            config.base_url = base_url;
        }
        Some(config)
    }
}

#[derive(Clone)]
pub struct ChatCompletionsAdapter {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

impl std::fmt::Debug for ChatCompletionsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsAdapter")
            .field("provider", &self.config.provider_name)
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl ChatCompletionsAdapter {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, SDKError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|error| {
                SDKError::configuration(format!("invalid API key header: {error}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs_f64(config.timeout.connect))
            .timeout(Duration::from_secs_f64(config.timeout.request))
            .default_headers(headers)
            .build()
            .map_err(|error| SDKError::network(error.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, SDKError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    SDKError::RequestTimeout(ErrorInfo::new(error.to_string()))
                } else {
                    SDKError::network(error.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();
            warn!(
                provider = %self.config.provider_name,
                status,
                "chat completions request rejected"
            );
            return Err(build_provider_error(
                &self.config.provider_name,
                status,
                &raw,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsAdapter {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        let body = build_chat_completions_body(&request, false);
        let response = self.post(&body).await?;
        let raw_json = response
            .json::<Value>()
            .await
            .map_err(|error| SDKError::network(error.to_string()))?;
        Ok(parse_chat_completions_response(
            raw_json,
            &self.config.provider_name,
        ))
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        let body = build_chat_completions_body(&request, true);
        debug!(
            provider = %self.config.provider_name,
            model = %request.model,
            messages = request.messages.len(),
            "opening chat completions stream"
        );
        let response = self.post(&body).await?;

        let mut byte_stream = response.bytes_stream();
        let (tx, rx) = mpsc::unbounded::<Result<StreamEvent, SDKError>>();
        let stream_read_timeout = Duration::from_secs_f64(self.config.timeout.stream_read);
        let provider = self.config.provider_name.clone();
        tokio::spawn(async move {
            let mut parser = SseParser::new();
            let mut pending = Vec::new();
            let mut state = StreamState::new(provider);
            let mut tx = tx;
            if tx
                .unbounded_send(Ok(StreamEvent::new(StreamEventType::StreamStart)))
                .is_err()
            {
                return;
            }
            loop {
                let next_item =
                    match tokio::time::timeout(stream_read_timeout, byte_stream.next()).await {
                        Ok(item) => item,
                        Err(_) => {
                            send_terminal_error(&mut tx, SDKError::stream("stream read timed out"));
                            return;
                        }
                    };
                let Some(item) = next_item else {
                    break;
                };
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        send_terminal_error(&mut tx, SDKError::stream(error.to_string()));
                        return;
                    }
                };
                pending.extend_from_slice(&bytes);
                let chunk = take_complete_utf8(&mut pending);
                let events = parser.push(&chunk);
                if process_sse_events(&events, &mut state, &mut tx).is_err() {
                    return;
                }
            }
            if !pending.is_empty() {
                let tail = String::from_utf8_lossy(&pending).into_owned();
                let events = parser.push(&tail);
                if process_sse_events(&events, &mut state, &mut tx).is_err() {
                    return;
                }
            }
            if let Some(event) = parser.finish()
                && process_sse_events(&[event], &mut state, &mut tx).is_err()
            {
                return;
            }
            let _ = emit_finish(&mut state, &mut tx);
        });

        Ok(Box::pin(rx))
    }

    fn supports_tool_choice(&self, mode: &str) -> bool {
        matches!(mode, "auto" | "none" | "required" | "named")
    }
}

/// Decode the complete UTF-8 prefix of `pending`, leaving a character split
/// across network reads in the buffer until its remaining bytes arrive.
/// Invalid sequences become U+FFFD.
fn take_complete_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(error) => {
                let valid_up_to = error.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                match error.error_len() {
                    Some(invalid_len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + invalid_len);
                    }
                    None => {
                        pending.drain(..valid_up_to);
                        return text;
                    }
                }
            }
        }
    }
}

type EventSender = mpsc::UnboundedSender<Result<StreamEvent, SDKError>>;

struct StreamState {
    provider: String,
    response_id: Option<String>,
    model: Option<String>,
    text_started: bool,
    text: String,
    // Keyed by the provider's tool call index so emission order is preserved.
    tool_calls: BTreeMap<u64, ToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl StreamState {
    fn new(provider: String) -> Self {
        Self {
            provider,
            response_id: None,
            model: None,
            text_started: false,
            text: String::new(),
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: None,
        }
    }
}

fn send(tx: &mut EventSender, event: StreamEvent) -> Result<(), ()> {
    tx.unbounded_send(Ok(event)).map_err(|_| ())
}

fn send_terminal_error(tx: &mut EventSender, error: SDKError) {
    let _ = tx.unbounded_send(Ok(StreamEvent::error(error)));
}

fn process_sse_events(
    events: &[SseEvent],
    state: &mut StreamState,
    tx: &mut EventSender,
) -> Result<(), ()> {
    for event in events {
        let data = event.data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let payload: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(error) => {
                send_terminal_error(
                    tx,
                    SDKError::stream(format!("invalid SSE JSON payload: {error}")),
                );
                return Err(());
            }
        };
        if let Some(message) = payload
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            send_terminal_error(tx, SDKError::stream(message.to_string()));
            return Err(());
        }
        if let Some(id) = payload.get("id").and_then(Value::as_str) {
            state.response_id = Some(id.to_string());
        }
        if let Some(model) = payload.get("model").and_then(Value::as_str) {
            state.model = Some(model.to_string());
        }
        if let Some(usage) = payload.get("usage").filter(|usage| !usage.is_null()) {
            state.usage = Some(parse_chat_usage(usage));
        }
        let Some(choices) = payload.get("choices").and_then(Value::as_array) else {
            continue;
        };
        for choice in choices {
            if let Some(delta) = choice.get("delta") {
                if let Some(content) = delta.get("content").and_then(Value::as_str)
                    && !content.is_empty()
                {
                    if !state.text_started {
                        state.text_started = true;
                        send(
                            tx,
                            StreamEvent {
                                text_id: Some(TEXT_ID.to_string()),
                                ..StreamEvent::new(StreamEventType::TextStart)
                            },
                        )?;
                    }
                    state.text.push_str(content);
                    send(tx, StreamEvent::text_delta(TEXT_ID, content))?;
                }

                if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
                    for item in tool_calls {
                        process_tool_call_delta(item, state, tx)?;
                    }
                }
            }
            if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str)
                && !finish_reason.is_empty()
            {
                state.finish_reason = Some(finish_reason.to_string());
            }
        }
    }
    Ok(())
}

fn process_tool_call_delta(
    item: &Value,
    state: &mut StreamState,
    tx: &mut EventSender,
) -> Result<(), ()> {
    let index = item
        .get("index")
        .and_then(Value::as_u64)
        .unwrap_or(state.tool_calls.len() as u64);
    let function = item.get("function");
    let arguments_delta = function
        .and_then(|function| function.get("arguments"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let is_new = !state.tool_calls.contains_key(&index);
    let current = state.tool_calls.entry(index).or_insert_with(|| ToolCall {
        id: item
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("call_{index}")),
        name: function
            .and_then(|function| function.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        arguments: Value::Object(Default::default()),
        raw_arguments: Some(String::new()),
    });
    current
        .raw_arguments
        .get_or_insert_with(String::new)
        .push_str(arguments_delta);
    let current = current.clone();

    if is_new {
        send(
            tx,
            StreamEvent::tool_call(StreamEventType::ToolCallStart, current.clone()),
        )?;
    }
    send(
        tx,
        StreamEvent::tool_call(StreamEventType::ToolCallDelta, current),
    )
}

fn emit_finish(state: &mut StreamState, tx: &mut EventSender) -> Result<(), ()> {
    if state.text_started {
        send(
            tx,
            StreamEvent {
                text_id: Some(TEXT_ID.to_string()),
                ..StreamEvent::new(StreamEventType::TextEnd)
            },
        )?;
    }

    let mut content = Vec::new();
    if !state.text.is_empty() {
        content.push(ContentPart::text(state.text.clone()));
    }
    for tool_call in state.tool_calls.values() {
        send(
            tx,
            StreamEvent::tool_call(StreamEventType::ToolCallEnd, tool_call.clone()),
        )?;
        content.push(ContentPart::tool_call(ToolCallData {
            id: tool_call.id.clone(),
            name: tool_call.name.clone(),
            arguments: arguments_value(tool_call.raw_arguments.as_deref()),
        }));
    }

    let reason = match state.finish_reason.as_deref() {
        Some("length") => "length",
        Some("tool_calls") => "tool_calls",
        Some("content_filter") => "content_filter",
        Some("stop") | None => {
            if state.tool_calls.is_empty() {
                "stop"
            } else {
                "tool_calls"
            }
        }
        Some(_) => "other",
    };

    let response = Response {
        id: state
            .response_id
            .clone()
            .unwrap_or_else(|| "chatcmpl_unknown".to_string()),
        model: state.model.clone().unwrap_or_else(|| "unknown".to_string()),
        provider: state.provider.clone(),
        message: Message {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason: FinishReason {
            reason: reason.to_string(),
            raw: state.finish_reason.clone(),
        },
        usage: state.usage.clone().unwrap_or_default(),
    };
    send(tx, StreamEvent::finish(response))
}

/// Parsed arguments when the raw string is valid JSON, otherwise the raw
/// string itself so validation can report it.
fn arguments_value(raw: Option<&str>) -> Value {
    match raw.map(str::trim) {
        None | Some("") => Value::Object(Default::default()),
        Some(raw) => serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn build_chat_completions_body(request: &Request, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": translate_messages(&request.messages),
        "stream": stream,
    });
    if stream {
        body["stream_options"] = json!({ "include_usage": true });
    }
    if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters
                        }
                    })
                })
                .collect(),
        );
    }
    if let Some(tool_choice) = &request.tool_choice {
        body["tool_choice"] = translate_tool_choice(tool_choice);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

fn translate_messages(messages: &[Message]) -> Value {
    let mut out = Vec::new();
    for message in messages {
        match message.role {
            Role::System => out.push(json!({ "role": "system", "content": message.text() })),
            Role::User => out.push(json!({ "role": "user", "content": message.text() })),
            Role::Assistant => {
                let tool_calls: Vec<Value> = message
                    .content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::ToolCall(call) => Some(json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": match &call.arguments {
                                    Value::String(raw) => raw.clone(),
                                    other => other.to_string(),
                                }
                            }
                        })),
                        _ => None,
                    })
                    .collect();
                let mut item = json!({ "role": "assistant", "content": message.text() });
                if !tool_calls.is_empty() {
                    item["tool_calls"] = Value::Array(tool_calls);
                }
                out.push(item);
            }
            Role::Tool => {
                for part in &message.content {
                    if let ContentPart::ToolResult(result) = part {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": result.tool_call_id,
                            "content": result.content
                        }));
                    }
                }
            }
        }
    }
    Value::Array(out)
}

fn translate_tool_choice(choice: &ToolChoice) -> Value {
    match (choice.mode.as_str(), &choice.tool_name) {
        ("named", Some(tool_name)) => json!({
            "type": "function",
            "function": { "name": tool_name }
        }),
        ("named", None) => Value::String("auto".to_string()),
        (mode, _) => Value::String(mode.to_string()),
    }
}

fn parse_chat_completions_response(raw_json: Value, provider: &str) -> Response {
    let id = raw_json
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("chatcmpl_unknown")
        .to_string();
    let model = raw_json
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let choice = raw_json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .cloned()
        .unwrap_or_else(|| json!({}));
    let message = choice.get("message").cloned().unwrap_or_else(|| json!({}));

    let mut content = Vec::new();
    if let Some(text) = message.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        content.push(ContentPart::text(text));
    }
    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let function = tool_call.get("function");
            content.push(ContentPart::tool_call(ToolCallData {
                id: tool_call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("call_{index}")),
                name: function
                    .and_then(|function| function.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                arguments: arguments_value(
                    function
                        .and_then(|function| function.get("arguments"))
                        .and_then(Value::as_str),
                ),
            }));
        }
    }

    Response {
        id,
        model,
        provider: provider.to_string(),
        message: Message {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason: map_finish_reason(choice.get("finish_reason").and_then(Value::as_str)),
        usage: raw_json
            .get("usage")
            .map(parse_chat_usage)
            .unwrap_or_default(),
    }
}

fn parse_chat_usage(raw_usage: &Value) -> Usage {
    let field = |name: &str| {
        raw_usage
            .get(name)
            .and_then(Value::as_u64)
            .unwrap_or_default()
    };
    Usage {
        input_tokens: field("prompt_tokens"),
        output_tokens: field("completion_tokens"),
        total_tokens: field("total_tokens"),
    }
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    let reason = match raw {
        Some("stop") | None => "stop",
        Some("length") => "length",
        Some("tool_calls") => "tool_calls",
        Some("content_filter") => "content_filter",
        Some(_) => "other",
    };
    FinishReason {
        reason: reason.to_string(),
        raw: raw.map(ToString::to_string),
    }
}

fn build_provider_error(provider: &str, status: u16, body_text: &str) -> SDKError {
    // Gemini wraps some errors in a single-element array.
    let raw_json = serde_json::from_str::<Value>(body_text)
        .ok()
        .map(|json| match json {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        });
    let message = raw_json
        .as_ref()
        .and_then(|json| json.get("error"))
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .or_else(|| {
            raw_json
                .as_ref()
                .and_then(|json| json.get("message"))
                .and_then(Value::as_str)
        })
        .unwrap_or(body_text)
        .to_string();

    let classification = map_http_status(status)
        .or_else(|| classify_message(&message).map(HttpErrorClassification::Provider));

    let kind = match classification {
        Some(HttpErrorClassification::RequestTimeout) => {
            return SDKError::RequestTimeout(ErrorInfo::new(message));
        }
        Some(HttpErrorClassification::Provider(kind)) => kind,
        None => ProviderErrorKind::Other,
    };
    SDKError::Provider(ProviderError {
        info: ErrorInfo::new(message),
        provider: provider.to_string(),
        kind,
        status_code: Some(status),
        raw: raw_json,
    })
}

struct ChatCompletionsFactory;

impl ProviderFactory for ChatCompletionsFactory {
    fn provider_id(&self) -> &'static str {
        DEFAULT_PROVIDER_NAME
    }

    fn from_env(&self) -> Option<Arc<dyn ProviderAdapter>> {
        let config = ChatCompletionsConfig::from_env()?;
        match ChatCompletionsAdapter::new(config) {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(error) => {
                warn!(%error, "failed to build chat completions adapter from env");
                None
            }
        }
    }
}

static REGISTER_FACTORY: Once = Once::new();

pub fn ensure_chat_completions_factory_registered() {
    REGISTER_FACTORY.call_once(|| {
        register_provider_factory(Arc::new(ChatCompletionsFactory));
    });
}
