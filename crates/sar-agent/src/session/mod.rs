//! Conversation turn loop.
//!
//! One call to [`ChatSession::send`] runs a full user turn: stream the
//! model's answer, dispatch the tool calls of each round in emission order,
//! feed the results back, and repeat until the model answers without tool
//! calls. After `max_steps` resolved rounds the next request is sent with
//! tool use disabled and any tool calls it still produces are dropped.
//!
//! The only suspension points are opening a stream and awaiting its next
//! event; both race the turn's [`AbortSignal`].

mod lifecycle;

pub use lifecycle::{LifecycleError, SessionStatus, transition_status};

use futures::StreamExt;
use sar_llm::{
    AbortSignal, Client, Message, Request, ResponseSeed, Role, SDKError, StreamAccumulator,
    StreamEventStream, StreamEventType, ToolChoice,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AssistantConfig;
use crate::tools::{Dispatcher, ToolInvocation, ToolResult};

/// Progress notifications emitted while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    TextDelta(String),
    ToolCall(ToolInvocation),
    ToolResult(ToolResult),
    StepFinished { step: u32 },
    /// The model asked for tools after the step bound was reached.
    ToolCallsSuppressed { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnFinish {
    Completed,
    StepBoundReached,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// All assistant text streamed during the turn.
    pub text: String,
    /// Tool-call rounds resolved.
    pub steps: u32,
    pub finish: TurnFinish,
    pub tool_results: Vec<ToolResult>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("a turn is already in progress")]
    Busy,
    #[error("response stream failed after {steps} step(s): {source}")]
    Stream {
        #[source]
        source: SDKError,
        partial_text: String,
        steps: u32,
    },
    #[error(transparent)]
    InvalidTransition(#[from] LifecycleError),
}

#[derive(Default)]
struct TurnProgress {
    text: String,
    tool_results: Vec<ToolResult>,
}

pub struct ChatSession {
    client: Client,
    dispatcher: Dispatcher,
    config: AssistantConfig,
    messages: Vec<Message>,
    status: SessionStatus,
    step_count: u32,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("model", &self.config.model)
            .field("status", &self.status)
            .field("step_count", &self.step_count)
            .field("messages", &self.messages.len())
            .finish()
    }
}

impl ChatSession {
    /// The dispatcher adopts the configured unknown-command policy.
    pub fn new(client: Client, dispatcher: Dispatcher, config: AssistantConfig) -> Self {
        let dispatcher = dispatcher.with_unknown_policy(config.unknown_command_policy);
        Self {
            client,
            dispatcher,
            config,
            messages: Vec::new(),
            status: SessionStatus::Idle,
            step_count: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    /// Conversation history without the system instruction.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Forget the conversation. Also recovers a session whose turn future
    /// was dropped before it finished.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.status = SessionStatus::Idle;
        self.step_count = 0;
    }

    pub async fn send<F>(
        &mut self,
        text: impl Into<String>,
        abort: &AbortSignal,
        mut observer: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnMut(TurnEvent),
    {
        if !self.status.accepts_input() {
            return Err(TurnError::Busy);
        }
        transition_status(&mut self.status, SessionStatus::Streaming)?;
        self.step_count = 0;
        self.messages.push(Message::user(text));
        let mut turn = TurnProgress::default();
        info!(model = %self.config.model, history = self.messages.len(), "turn started");

        loop {
            if abort.is_aborted() {
                return self.finish(turn, TurnFinish::Cancelled);
            }

            let forced_final = self.step_count >= self.config.max_steps;
            if self.status == SessionStatus::AwaitingToolResults {
                let next = if forced_final {
                    SessionStatus::AwaitingFinal
                } else {
                    SessionStatus::Streaming
                };
                transition_status(&mut self.status, next)?;
            }

            let request = self.build_request(forced_final);
            let seed = ResponseSeed {
                id: String::new(),
                model: request.model.clone(),
                provider: request.provider.clone().unwrap_or_default(),
            };
            let opened = tokio::select! {
                biased;
                _ = abort.aborted() => None,
                result = self.client.stream(request) => Some(result),
            };
            let stream = match opened {
                None => return self.finish(turn, TurnFinish::Cancelled),
                Some(Ok(stream)) => stream,
                Some(Err(error)) => return Err(self.fail(error, turn)),
            };

            let mut accumulator = StreamAccumulator::new(seed);
            let consumed = consume_stream(stream, abort, &mut accumulator, &mut observer).await;
            let round_text = accumulator.text();
            turn.text.push_str(&round_text);
            match consumed {
                Err(error) => {
                    self.push_assistant_text(&round_text);
                    return Err(self.fail(error, turn));
                }
                Ok(false) => {
                    self.push_assistant_text(&round_text);
                    return self.finish(turn, TurnFinish::Cancelled);
                }
                Ok(true) => {}
            }

            let response = accumulator.response();
            let tool_calls = response.tool_calls();
            if tool_calls.is_empty() {
                self.push_assistant_text(&response.text());
                let finish = if forced_final {
                    TurnFinish::StepBoundReached
                } else {
                    TurnFinish::Completed
                };
                return self.finish(turn, finish);
            }
            if forced_final {
                warn!(
                    count = tool_calls.len(),
                    max_steps = self.config.max_steps,
                    "step bound reached, suppressing tool calls"
                );
                observer(TurnEvent::ToolCallsSuppressed {
                    count: tool_calls.len(),
                });
                self.push_assistant_text(&response.text());
                return self.finish(turn, TurnFinish::StepBoundReached);
            }

            transition_status(&mut self.status, SessionStatus::AwaitingToolResults)?;
            let mut assistant = response.message;
            assistant.role = Role::Assistant;
            self.messages.push(assistant);
            for call in &tool_calls {
                let invocation = ToolInvocation::from(call);
                observer(TurnEvent::ToolCall(invocation.clone()));
                let result = self.dispatcher.dispatch(&invocation);
                self.messages.push(Message::tool_result(
                    result.id.clone(),
                    result.output.clone(),
                    result.is_error,
                ));
                observer(TurnEvent::ToolResult(result.clone()));
                turn.tool_results.push(result);
            }
            self.step_count += 1;
            observer(TurnEvent::StepFinished {
                step: self.step_count,
            });
        }
    }

    fn build_request(&self, forced_final: bool) -> Request {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(self.config.system_prompt.clone()));
        messages.extend(self.messages.iter().cloned());

        let mut request = Request::new(self.config.model.clone(), messages);
        request.provider = self.config.provider.clone();
        let choice = if forced_final {
            ToolChoice::none()
        } else {
            ToolChoice::auto()
        };
        let supported = self
            .client
            .supports_tool_choice(request.provider.as_deref(), &choice.mode);
        // A backend that cannot be told `none` gets no tools at all instead.
        if supported || !forced_final {
            request.tools = Some(self.dispatcher.registry().tool_definitions());
        }
        if supported {
            request.tool_choice = Some(choice);
        }
        request.temperature = self.config.temperature;
        request
    }

    fn push_assistant_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.messages.push(Message::assistant(text));
        }
    }

    fn finish(
        &mut self,
        turn: TurnProgress,
        finish: TurnFinish,
    ) -> Result<TurnOutcome, TurnError> {
        transition_status(&mut self.status, SessionStatus::Idle)?;
        info!(?finish, steps = self.step_count, "turn finished");
        Ok(TurnOutcome {
            text: turn.text,
            steps: self.step_count,
            finish,
            tool_results: turn.tool_results,
        })
    }

    fn fail(&mut self, source: SDKError, turn: TurnProgress) -> TurnError {
        if let Err(error) = transition_status(&mut self.status, SessionStatus::Errored) {
            return error.into();
        }
        warn!(error = %source, steps = self.step_count, "turn failed");
        TurnError::Stream {
            source,
            partial_text: turn.text,
            steps: self.step_count,
        }
    }
}

/// Feed stream events into `accumulator` until the stream ends (`Ok(true)`)
/// or the signal fires (`Ok(false)`).
async fn consume_stream<F>(
    mut stream: StreamEventStream,
    abort: &AbortSignal,
    accumulator: &mut StreamAccumulator,
    observer: &mut F,
) -> Result<bool, SDKError>
where
    F: FnMut(TurnEvent),
{
    loop {
        let next = tokio::select! {
            biased;
            _ = abort.aborted() => return Ok(false),
            item = stream.next() => item,
        };
        let Some(item) = next else {
            return Ok(true);
        };
        let event = item?;
        if event.is(StreamEventType::Error) {
            return Err(event
                .error
                .unwrap_or_else(|| SDKError::stream("provider reported a stream error")));
        }
        if event.is(StreamEventType::TextDelta)
            && let Some(delta) = event.delta.as_deref()
            && !delta.is_empty()
        {
            observer(TurnEvent::TextDelta(delta.to_string()));
        }
        accumulator.process(&event);
    }
}
