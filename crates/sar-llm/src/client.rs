//! Core client: routes requests to registered provider adapters.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::SDKError;
use crate::provider::{ProviderAdapter, registered_factories};
use crate::stream::StreamEventStream;
use crate::types::{Request, Response};

#[derive(Clone, Default)]
pub struct Client {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    default_provider: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.providers.keys().collect();
        providers.sort();
        f.debug_struct("Client")
            .field("providers", &providers)
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client with a single provider that is also the default.
    pub fn with_provider(provider: Arc<dyn ProviderAdapter>) -> Result<Self, SDKError> {
        let mut client = Self::new();
        client.register_provider(provider)?;
        Ok(client)
    }

    pub fn register_provider(
        &mut self,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Result<(), SDKError> {
        provider.initialize()?;
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Whether the provider a request would be routed to accepts the given
    /// tool choice mode. `None` means the default provider.
    pub fn supports_tool_choice(&self, provider: Option<&str>, mode: &str) -> bool {
        provider
            .or(self.default_provider.as_deref())
            .and_then(|name| self.providers.get(name))
            .is_some_and(|adapter| adapter.supports_tool_choice(mode))
    }

    /// Build a client from every registered factory that finds its configuration.
    pub fn from_env() -> Result<Self, SDKError> {
        crate::openai_compat::ensure_chat_completions_factory_registered();

        let mut client = Self::new();
        for factory in registered_factories() {
            if let Some(adapter) = factory.from_env() {
                debug!(provider = factory.provider_id(), "provider configured from env");
                client.register_provider(adapter)?;
            }
        }

        if client.providers.is_empty() {
            return Err(SDKError::configuration(
                "no providers configured from environment",
            ));
        }
        Ok(client)
    }

    pub async fn complete(&self, mut request: Request) -> Result<Response, SDKError> {
        let adapter = self.resolve_adapter(&mut request)?;
        adapter.complete(request).await
    }

    pub async fn stream(&self, mut request: Request) -> Result<StreamEventStream, SDKError> {
        let adapter = self.resolve_adapter(&mut request)?;
        adapter.stream(request).await
    }

    fn resolve_adapter(
        &self,
        request: &mut Request,
    ) -> Result<Arc<dyn ProviderAdapter>, SDKError> {
        let provider_name = request
            .provider
            .clone()
            .or_else(|| self.default_provider.clone())
            .ok_or_else(|| SDKError::configuration("no provider configured"))?;
        let adapter = self
            .providers
            .get(&provider_name)
            .cloned()
            .ok_or_else(|| {
                SDKError::configuration(format!("provider '{provider_name}' not registered"))
            })?;
        request.provider = Some(provider_name);
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::provider::{ProviderFactory, clear_provider_factories_for_tests};
    use crate::provider::register_provider_factory;
    use crate::stream::{StreamEvent, StreamEventType};
    use crate::types::{FinishReason, Message, Usage};
    use futures::stream;
    use std::sync::{Mutex, OnceLock};

    struct TestAdapter {
        name: String,
    }

    #[async_trait]
    impl ProviderAdapter for TestAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, _request: Request) -> Result<Response, SDKError> {
            Ok(Response {
                id: "resp".to_string(),
                model: "model".to_string(),
                provider: self.name.clone(),
                message: Message::assistant("ok"),
                finish_reason: FinishReason::new("stop"),
                usage: Usage::default(),
            })
        }

        async fn stream(&self, _request: Request) -> Result<StreamEventStream, SDKError> {
            Ok(Box::pin(stream::iter(vec![Ok(StreamEvent::new(
                StreamEventType::Finish,
            ))])))
        }
    }

    struct StaticFactory {
        id: &'static str,
        enabled: bool,
    }

    impl ProviderFactory for StaticFactory {
        fn provider_id(&self) -> &'static str {
            self.id
        }

        fn from_env(&self) -> Option<Arc<dyn ProviderAdapter>> {
            self.enabled.then(|| {
                Arc::new(TestAdapter {
                    name: self.id.to_string(),
                }) as Arc<dyn ProviderAdapter>
            })
        }
    }

    static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn global_test_guard() -> std::sync::MutexGuard<'static, ()> {
        TEST_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn test_client(name: &str) -> Client {
        Client::with_provider(Arc::new(TestAdapter {
            name: name.to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn tool_choice_support_follows_the_routed_adapter() {
        let client = test_client("test");
        assert!(client.supports_tool_choice(None, "none"));
        assert!(client.supports_tool_choice(Some("test"), "auto"));
        assert!(!client.supports_tool_choice(None, "required"));
        assert!(!client.supports_tool_choice(Some("missing"), "auto"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_request_provider_is_a_configuration_error() {
        let client = test_client("test");
        let mut request = Request::new("model", vec![Message::user("hi")]);
        request.provider = Some("missing".to_string());
        let err = client.complete(request).await.unwrap_err();
        assert!(matches!(err, SDKError::Configuration(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn first_registered_provider_becomes_default() {
        let mut client = test_client("first");
        client
            .register_provider(Arc::new(TestAdapter {
                name: "second".to_string(),
            }))
            .unwrap();
        assert_eq!(client.default_provider(), Some("first"));
        let response = client
            .complete(Request::new("model", vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.provider, "first");
    }

    #[test]
    fn from_env_registers_enabled_factories() {
        let _guard = global_test_guard();
        clear_provider_factories_for_tests();
        register_provider_factory(Arc::new(StaticFactory {
            id: "provider-a",
            enabled: true,
        }));
        register_provider_factory(Arc::new(StaticFactory {
            id: "provider-b",
            enabled: false,
        }));
        let client = Client::from_env().unwrap();
        assert!(client.providers.contains_key("provider-a"));
        assert!(!client.providers.contains_key("provider-b"));
        clear_provider_factories_for_tests();
    }

    #[test]
    fn from_env_fails_fast_when_no_provider_is_available() {
        let _guard = global_test_guard();
        clear_provider_factories_for_tests();
        register_provider_factory(Arc::new(StaticFactory {
            id: "provider-disabled",
            enabled: false,
        }));
        // The built-in chat-completions factory may also be registered; make
        // sure it finds no configuration.
        // SAFETY: guarded by TEST_LOCK; no other test in this crate reads these vars concurrently.
        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
            std::env::remove_var("SAR_LLM_API_KEY");
        }
        let result = Client::from_env();
        assert!(matches!(result, Err(SDKError::Configuration(_))));
        clear_provider_factories_for_tests();
    }
}
