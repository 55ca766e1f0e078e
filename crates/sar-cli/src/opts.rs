//! Global CLI options.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sar_agent::{AssistantConfig, UnknownCommandPolicy};
use sar_llm::{ChatCompletionsAdapter, ChatCompletionsConfig, Client};

/// Options shared by all commands. Flags override the `SAR_*` environment
/// read by [`AssistantConfig::from_env`].
#[derive(Args, Debug, Clone)]
pub struct AssistantOpts {
    /// Model id (env: SAR_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Tool-call rounds per turn before a final answer is forced (env: SAR_MAX_STEPS)
    #[arg(long, global = true)]
    pub max_steps: Option<u32>,

    /// Answer for unknown tool names: reject | acknowledge (env: SAR_UNKNOWN_COMMANDS)
    #[arg(long = "unknown-commands", global = true)]
    pub unknown_commands: Option<UnknownCommandPolicy>,

    /// OpenAI-compatible endpoint base URL (env: SAR_LLM_BASE_URL)
    #[arg(long, global = true, env = "SAR_LLM_BASE_URL")]
    pub base_url: Option<String>,
}

impl AssistantOpts {
    pub fn assistant_config(&self) -> Result<AssistantConfig> {
        let mut config = AssistantConfig::from_env().context("read assistant settings")?;
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if let Some(policy) = self.unknown_commands {
            config.unknown_command_policy = policy;
        }
        Ok(config)
    }

    /// Build an LLM client from the environment, honoring `--base-url`.
    pub fn llm_client(&self) -> Result<Client> {
        let Some(base_url) = &self.base_url else {
            return Client::from_env()
                .context("configure LLM client (set GEMINI_API_KEY or SAR_LLM_API_KEY)");
        };
        let config = ChatCompletionsConfig::from_env()
            .context("GEMINI_API_KEY or SAR_LLM_API_KEY must be set")?
            .with_base_url(base_url.clone());
        let adapter = ChatCompletionsAdapter::new(config).context("create LLM adapter")?;
        Client::with_provider(Arc::new(adapter)).context("register LLM adapter")
    }
}
