use async_trait::async_trait;

use crate::{ClientOptions, Message, ModelConfig, Provider, Response};
use switchboard_types::Result;

// ---------------------------------------------------------------------------
// ProviderAdapter
// ---------------------------------------------------------------------------

/// The capability contract every provider adapter implements.
///
/// An adapter is constructed empty, becomes usable after [`initialize`],
/// and releases its transport on [`close`]. Operations on an adapter that is
/// not initialized fail with `NotInitialized`.
///
/// [`initialize`]: ProviderAdapter::initialize
/// [`close`]: ProviderAdapter::close
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn initialize(&mut self, options: ClientOptions) -> Result<()>;
    async fn text_completion(&self, messages: &[Message], config: &ModelConfig)
        -> Result<Response>;
    async fn image_recognition(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response>;
    async fn close(&mut self) -> Result<()>;
    fn provider(&self) -> Provider;
    fn name(&self) -> &str {
        self.provider().as_str()
    }
    fn default_model(&self) -> &str;
    fn supports_images(&self) -> bool;
}

// ---------------------------------------------------------------------------
// DynProvider
// ---------------------------------------------------------------------------

pub struct DynProvider(Box<dyn ProviderAdapter>);

impl DynProvider {
    pub fn new(provider: impl ProviderAdapter + 'static) -> Self {
        Self(Box::new(provider))
    }

    pub async fn initialize(&mut self, options: ClientOptions) -> Result<()> {
        tracing::debug!(provider = self.name(), ?options, "initializing provider");
        self.0.initialize(options).await
    }

    pub async fn text_completion(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        log_request(self.name(), "text_completion", messages);
        let resp = self.0.text_completion(messages, config).await;
        log_response(self.name(), "text_completion", &resp);
        resp
    }

    pub async fn image_recognition(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        log_request(self.name(), "image_recognition", messages);
        let resp = self.0.image_recognition(messages, config).await;
        log_response(self.name(), "image_recognition", &resp);
        resp
    }

    pub async fn close(&mut self) -> Result<()> {
        tracing::debug!(provider = self.name(), "closing provider");
        self.0.close().await
    }

    pub fn provider(&self) -> Provider {
        self.0.provider()
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn default_model(&self) -> &str {
        self.0.default_model()
    }

    pub fn supports_images(&self) -> bool {
        self.0.supports_images()
    }
}

impl std::fmt::Debug for DynProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynProvider").field(&self.name()).finish()
    }
}

fn log_request(provider: &str, operation: &str, messages: &[Message]) {
    tracing::info!(
        provider,
        operation,
        messages = messages.len(),
        images = messages.iter().map(|m| m.images.len()).sum::<usize>(),
        "LLM request"
    );
}

fn log_response(provider: &str, operation: &str, resp: &Result<Response>) {
    match resp {
        Ok(resp) => tracing::info!(
            provider,
            operation,
            model = %resp.model,
            input_tokens = resp.usage.input_tokens,
            output_tokens = resp.usage.output_tokens,
            "LLM response"
        ),
        Err(e) => tracing::warn!(
            provider,
            operation,
            kind = ?e.kind(),
            error = %e,
            "LLM request failed"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
