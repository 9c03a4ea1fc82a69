use async_trait::async_trait;
use serde_json::json;

use crate::http;
use crate::{
    ClientOptions, Message, ModelConfig, Provider, ProviderAdapter, Response, Role, TokenUsage,
};
use switchboard_types::{Result, SwitchboardError};

const PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

// ---------------------------------------------------------------------------
// OpenAiAdapter
// ---------------------------------------------------------------------------

/// Adapter for the OpenAI chat completions API.
#[derive(Debug, Default)]
pub struct OpenAiAdapter {
    session: Option<Session>,
}

struct Session {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| SwitchboardError::NotInitialized {
            provider: PROVIDER.into(),
        })
    }

    fn build_request_body(
        model: &str,
        messages: &[Message],
        config: &ModelConfig,
    ) -> serde_json::Value {
        // 1. System prompt goes first, then the conversation in order
        let mut chat: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = config.system_text() {
            chat.push(json!({ "role": "system", "content": system }));
        }
        chat.extend(messages.iter().map(convert_message));

        // 2. Sampling parameters, as given
        let mut body = json!({
            "model": model,
            "messages": chat,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "max_tokens": config.max_tokens,
        });

        // 3. Stop sequences
        if !config.stop_sequences.is_empty() {
            body["stop"] = json!(config.stop_sequences);
        }

        body
    }

    fn parse_response(model: &str, body: serde_json::Value) -> Response {
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage_obj = &body["usage"];
        let input_tokens = usage_obj["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = usage_obj["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = usage_obj["total_tokens"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens);

        Response {
            text,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            model: body["model"].as_str().unwrap_or(model).to_string(),
            raw: body,
        }
    }
}

fn convert_message(msg: &Message) -> serde_json::Value {
    json!({
        "role": match msg.role {
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
        },
        "content": msg.content,
    })
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn initialize(&mut self, options: ClientOptions) -> Result<()> {
        let api_key = options
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SwitchboardError::MissingCredentials {
                provider: PROVIDER.into(),
                field: "api_key",
            })?;

        self.session = Some(Session {
            api_key,
            client: http::build_client(PROVIDER, options.timeout_secs)?,
            base_url: options
                .endpoint_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: options
                .model_id
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        });
        Ok(())
    }

    async fn text_completion(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        let session = self.session()?;
        let body = Self::build_request_body(&session.model, messages, config);
        tracing::debug!(provider = PROVIDER, %body, "chat completion request");

        let request = session
            .client
            .post(format!(
                "{}/v1/chat/completions",
                session.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&session.api_key)
            .json(&body);
        let json = http::send_json(PROVIDER, request).await?;

        Ok(Self::parse_response(&session.model, json))
    }

    async fn image_recognition(
        &self,
        _messages: &[Message],
        _config: &ModelConfig,
    ) -> Result<Response> {
        Err(SwitchboardError::NotImplemented {
            provider: PROVIDER.into(),
            operation: "image_recognition",
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn default_model(&self) -> &str {
        self.session.as_ref().map_or(DEFAULT_MODEL, |s| &s.model)
    }

    fn supports_images(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
