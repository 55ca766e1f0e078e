//! Error taxonomy, adapter timeouts and abort signalling.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Notify;

/// Shared error message and cause payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Provider error classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Authentication,
    AccessDenied,
    NotFound,
    InvalidRequest,
    RateLimit,
    Server,
    ContentFilter,
    ContextLength,
    Other,
}

/// Error reported by a provider endpoint, with HTTP metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    pub info: ErrorInfo,
    pub provider: String,
    pub kind: ProviderErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} ({}): {}", self.provider, status, self.info),
            None => write!(f, "{}: {}", self.provider, self.info),
        }
    }
}

/// Unified SDK error type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SDKError {
    #[error("provider error: {0}")]
    Provider(ProviderError),
    #[error("request timed out: {0}")]
    RequestTimeout(ErrorInfo),
    #[error("aborted: {0}")]
    Abort(ErrorInfo),
    #[error("network error: {0}")]
    Network(ErrorInfo),
    #[error("stream error: {0}")]
    Stream(ErrorInfo),
    #[error("invalid tool call: {0}")]
    InvalidToolCall(ErrorInfo),
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
}

impl SDKError {
    pub fn network(message: impl Into<String>) -> Self {
        SDKError::Network(ErrorInfo::new(message))
    }

    pub fn stream(message: impl Into<String>) -> Self {
        SDKError::Stream(ErrorInfo::new(message))
    }

    pub fn abort(message: impl Into<String>) -> Self {
        SDKError::Abort(ErrorInfo::new(message))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SDKError::Configuration(ErrorInfo::new(message))
    }

    pub fn message(&self) -> &str {
        match self {
            SDKError::Provider(err) => &err.info.message,
            SDKError::RequestTimeout(info)
            | SDKError::Abort(info)
            | SDKError::Network(info)
            | SDKError::Stream(info)
            | SDKError::InvalidToolCall(info)
            | SDKError::Configuration(info) => &info.message,
        }
    }
}

/// HTTP status classification result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpErrorClassification {
    Provider(ProviderErrorKind),
    RequestTimeout,
}

/// Map HTTP status codes to error classification.
pub fn map_http_status(status: u16) -> Option<HttpErrorClassification> {
    use HttpErrorClassification::Provider;

    match status {
        400 | 422 => Some(Provider(ProviderErrorKind::InvalidRequest)),
        401 => Some(Provider(ProviderErrorKind::Authentication)),
        403 => Some(Provider(ProviderErrorKind::AccessDenied)),
        404 => Some(Provider(ProviderErrorKind::NotFound)),
        408 => Some(HttpErrorClassification::RequestTimeout),
        413 => Some(Provider(ProviderErrorKind::ContextLength)),
        429 => Some(Provider(ProviderErrorKind::RateLimit)),
        500 | 502 | 503 | 504 => Some(Provider(ProviderErrorKind::Server)),
        _ => None,
    }
}

/// Classify error kind from message content when status codes are ambiguous.
pub fn classify_message(message: &str) -> Option<ProviderErrorKind> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not found") || lower.contains("does not exist") {
        return Some(ProviderErrorKind::NotFound);
    }
    if lower.contains("unauthorized") || lower.contains("api key not valid") {
        return Some(ProviderErrorKind::Authentication);
    }
    if lower.contains("context length") || lower.contains("too many tokens") {
        return Some(ProviderErrorKind::ContextLength);
    }
    if lower.contains("content filter") || lower.contains("safety") {
        return Some(ProviderErrorKind::ContentFilter);
    }
    None
}

/// Adapter-level timeouts for HTTP operations, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdapterTimeout {
    pub connect: f64,
    pub request: f64,
    pub stream_read: f64,
}

impl Default for AdapterTimeout {
    fn default() -> Self {
        Self {
            connect: 10.0,
            request: 120.0,
            stream_read: 30.0,
        }
    }
}

#[derive(Debug, Default)]
struct AbortState {
    flag: AtomicBool,
    notify: Notify,
}

/// Abort signal shared between callers and async operations.
///
/// The signal can be polled with [`AbortSignal::is_aborted`] or awaited with
/// [`AbortSignal::aborted`], which lets a pending stream read be abandoned the
/// moment the signal fires.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    pub fn abort(&self) {
        self.state.flag.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Resolves once the signal has been aborted.
    pub async fn aborted(&self) {
        loop {
            // Registered before the flag check so a concurrent abort is not missed.
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

/// Abort controller that owns the underlying signal.
#[derive(Clone, Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        self.signal.abort();
    }
}
