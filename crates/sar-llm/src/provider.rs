//! Provider adapter seam and the process-wide factory registry.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use async_trait::async_trait;

use crate::errors::SDKError;
use crate::stream::StreamEventStream;
use crate::types::{Request, Response};

/// A concrete LLM backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: Request) -> Result<Response, SDKError>;

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError>;

    fn initialize(&self) -> Result<(), SDKError> {
        Ok(())
    }

    /// Whether the backend honours a `tool_choice` mode. Callers strip the
    /// choice (and tools, for `none`) when this returns false.
    fn supports_tool_choice(&self, mode: &str) -> bool {
        matches!(mode, "auto" | "none")
    }
}

/// Builds an adapter from environment configuration, if the provider is configured.
pub trait ProviderFactory: Send + Sync {
    fn provider_id(&self) -> &'static str;

    fn from_env(&self) -> Option<Arc<dyn ProviderAdapter>>;
}

static FACTORIES: OnceLock<RwLock<Vec<Arc<dyn ProviderFactory>>>> = OnceLock::new();

fn factory_store() -> &'static RwLock<Vec<Arc<dyn ProviderFactory>>> {
    FACTORIES.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register a factory; a second registration with the same id is ignored.
pub fn register_provider_factory(factory: Arc<dyn ProviderFactory>) {
    let mut factories = factory_store()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if factories
        .iter()
        .any(|existing| existing.provider_id() == factory.provider_id())
    {
        return;
    }
    factories.push(factory);
}

/// Registered factories in registration order.
pub fn registered_factories() -> Vec<Arc<dyn ProviderFactory>> {
    factory_store()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
pub(crate) fn clear_provider_factories_for_tests() {
    factory_store()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
