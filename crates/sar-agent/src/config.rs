use sar_llm::DEFAULT_MODEL;
use thiserror::Error;

use crate::tools::{ParsePolicyError, UnknownCommandPolicy};

pub const DEFAULT_MAX_STEPS: u32 = 5;

pub const SYSTEM_PROMPT: &str = "You are the SAR Assistant for Haldwani landslide risk monitoring. \
Explain clearly and accessibly. When users ask about the map, specific locations, risk zones, \
rainfall patterns, or want to visualize data, Ask them to scroll to the map section and check the \
relevant layer. Haldwani coordinates: Center at 29.3°N, 79.525°E. High-risk areas include \
Ranibagh (29.23°N, 79.51°E), Amritpur Paniyali (29.28°N, 79.55°E), and Nainital-Bhimtal corridor \
(29.33°N, 79.61°E). Prefer concise, actionable answers with context from SAR and rainfall \
patterns. If data is not available, use your knowledge but mention it's general guidance. When \
asked who developed you, say TEAM KAIZEN. Be proactive: if someone asks about risks in an area.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var} value '{value}': expected a non-negative integer")]
    InvalidMaxSteps { var: &'static str, value: String },
    #[error("invalid {var} value: {source}")]
    InvalidPolicy {
        var: &'static str,
        #[source]
        source: ParsePolicyError,
    },
}

/// Settings for one assistant session.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub model: String,
    /// Tool-call rounds allowed per user turn before a final answer is forced.
    pub max_steps: u32,
    pub system_prompt: String,
    pub unknown_command_policy: UnknownCommandPolicy,
    /// Provider to route requests to; the client's default when unset.
    pub provider: Option<String>,
    pub temperature: Option<f64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            system_prompt: SYSTEM_PROMPT.to_string(),
            unknown_command_policy: UnknownCommandPolicy::default(),
            provider: None,
            temperature: None,
        }
    }
}

impl AssistantConfig {
    /// Defaults overridden by `SAR_MODEL`, `SAR_MAX_STEPS` and
    /// `SAR_UNKNOWN_COMMANDS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(model) = var("SAR_MODEL") {
            config.model = model;
        }
        if let Some(value) = var("SAR_MAX_STEPS") {
            config.max_steps =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidMaxSteps {
                        var: "SAR_MAX_STEPS",
                        value,
                    })?;
        }
        if let Some(value) = var("SAR_UNKNOWN_COMMANDS") {
            config.unknown_command_policy =
                value
                    .parse()
                    .map_err(|source| ConfigError::InvalidPolicy {
                        var: "SAR_UNKNOWN_COMMANDS",
                        source,
                    })?;
        }
        Ok(config)
    }
}
