use async_trait::async_trait;
use serde_json::json;

use crate::http;
use crate::{
    ClientOptions, Message, ModelConfig, Provider, ProviderAdapter, Response, TokenUsage,
};
use switchboard_types::{Result, SwitchboardError};

const PROVIDER: &str = "gemini";
const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-lite-preview-02-05";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ---------------------------------------------------------------------------
// GeminiAdapter
// ---------------------------------------------------------------------------

/// Adapter for the Gemini `generateContent` API. Only the last message of a
/// conversation is sent.
#[derive(Debug, Default)]
pub struct GeminiAdapter {
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

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| SwitchboardError::NotInitialized {
            provider: PROVIDER.into(),
        })
    }

    fn build_request_body(
        parts: Vec<serde_json::Value>,
        config: &ModelConfig,
    ) -> serde_json::Value {
        let mut gen_config = json!({
            "temperature": config.temperature,
            "topP": config.top_p,
            "topK": config.top_k,
            "maxOutputTokens": config.max_tokens,
        });
        if !config.stop_sequences.is_empty() {
            gen_config["stopSequences"] = json!(config.stop_sequences);
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": gen_config,
        });

        if let Some(system) = config.system_text() {
            body["systemInstruction"] = json!({
                "role": "user",
                "parts": [{ "text": system }],
            });
        }

        body
    }

    fn text_parts(message: &Message) -> Vec<serde_json::Value> {
        vec![json!({ "text": message.content })]
    }

    async fn image_parts(
        &self,
        session: &Session,
        message: &Message,
    ) -> Result<Vec<serde_json::Value>> {
        let mut parts = Vec::with_capacity(message.images.len() + 1);
        for image in &message.images {
            if let Some(data) = http::image_bytes(PROVIDER, &session.client, image).await? {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": http::encode_base64(&data),
                    }
                }));
            }
        }
        if !message.content.is_empty() {
            parts.push(json!({ "text": message.content }));
        }
        Ok(parts)
    }

    fn parse_response(model: &str, body: serde_json::Value) -> Response {
        // Only the first part of the first candidate is read.
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage_meta = &body["usageMetadata"];
        let input_tokens = usage_meta["promptTokenCount"].as_u64().unwrap_or(0);
        let output_tokens = usage_meta["candidatesTokenCount"].as_u64().unwrap_or(0);
        let total_tokens = usage_meta["totalTokenCount"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens);

        Response {
            text,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            model: body["modelVersion"].as_str().unwrap_or(model).to_string(),
            raw: body,
        }
    }

    async fn generate(&self, session: &Session, body: serde_json::Value) -> Result<Response> {
        tracing::debug!(provider = PROVIDER, model = %session.model, "generateContent request");

        let url = format!(
            "{}/{}:generateContent",
            session.base_url.trim_end_matches('/'),
            session.model
        );
        let request = session
            .client
            .post(&url)
            .query(&[("key", session.api_key.as_str())])
            .json(&body);
        let json = http::send_json(PROVIDER, request).await?;

        Ok(Self::parse_response(&session.model, json))
    }
}

fn last_message(messages: &[Message]) -> Result<&Message> {
    messages
        .last()
        .ok_or_else(|| SwitchboardError::InvalidRequest("no messages provided".into()))
}

/// Gemini model resource names carry a `models/` prefix.
fn normalize_model(model: String) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model
    } else {
        format!("models/{model}")
    }
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
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
            model: normalize_model(
                options
                    .model_id
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ),
        });
        Ok(())
    }

    async fn text_completion(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        let session = self.session()?;
        let message = last_message(messages)?;
        let body = Self::build_request_body(Self::text_parts(message), config);
        self.generate(session, body).await
    }

    async fn image_recognition(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        let session = self.session()?;
        let message = last_message(messages)?;
        let parts = self.image_parts(session, message).await?;
        let body = Self::build_request_body(parts, config);
        self.generate(session, body).await
    }

    async fn close(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn default_model(&self) -> &str {
        self.session.as_ref().map_or(DEFAULT_MODEL, |s| &s.model)
    }

    fn supports_images(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Image;

    fn yoda_config() -> ModelConfig {
        ModelConfig::default()
            .with_temperature(0.9)
            .with_top_p(0.5)
            .with_top_k(20)
            .with_max_tokens(100)
            .with_system_prompt("You are Yoda from Star Wars.")
    }

    async fn initialized() -> GeminiAdapter {
        let mut adapter = GeminiAdapter::new();
        adapter
            .initialize(ClientOptions::default().with_api_key("g-key"))
            .await
            .unwrap();
        adapter
    }

    #[test]
    fn build_request_body_for_text() {
        let msg = Message::user("hi?");
        let body =
            GeminiAdapter::build_request_body(GeminiAdapter::text_parts(&msg), &yoda_config());

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"], json!([{ "text": "hi?" }]));

        let gen = &body["generationConfig"];
        assert!((gen["temperature"].as_f64().unwrap() - 0.9).abs() < 0.01);
        assert!((gen["topP"].as_f64().unwrap() - 0.5).abs() < 0.01);
        assert_eq!(gen["topK"], 20);
        assert_eq!(gen["maxOutputTokens"], 100);
        assert!(gen.get("stopSequences").is_none());

        assert_eq!(body["systemInstruction"]["role"], "user");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are Yoda from Star Wars."
        );
    }

    #[test]
    fn build_request_body_without_system_prompt() {
        let config = ModelConfig::default().with_stop_sequences(vec!["END".to_string()]);
        let body = GeminiAdapter::build_request_body(vec![json!({ "text": "x" })], &config);
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["generationConfig"]["stopSequences"], json!(["END"]));
    }

    #[tokio::test]
    async fn image_parts_inline_images_before_text() {
        let adapter = initialized().await;
        let session = adapter.session().unwrap();
        let msg = Message::user("What is in this image?")
            .with_image(Image::from_bytes("jpeg", b"abc".to_vec()))
            .with_image(Image::default());

        let parts = adapter.image_parts(session, &msg).await.unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[1]["text"], "What is in this image?");
    }

    #[tokio::test]
    async fn image_parts_without_text() {
        let adapter = initialized().await;
        let session = adapter.session().unwrap();
        let msg = Message::user("").with_image(Image::from_bytes("png", vec![0]));
        let parts = adapter.image_parts(session, &msg).await.unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].get("text").is_none());
    }

    #[test]
    fn parse_response_reads_first_candidate_part() {
        let response_json = json!({
            "candidates": [
                {
                    "content": {
                        "role": "model",
                        "parts": [
                            { "text": "Hello, young one. Hmm." },
                            { "text": "Unread second part" }
                        ]
                    },
                    "finishReason": "STOP"
                }
            ],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 8,
                "totalTokenCount": 20
            },
            "modelVersion": "gemini-2.0-flash-lite-preview-02-05"
        });

        let resp = GeminiAdapter::parse_response(DEFAULT_MODEL, response_json);
        assert_eq!(resp.text, "Hello, young one. Hmm.");
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 8);
        assert_eq!(resp.usage.total_tokens, 20);
        assert_eq!(resp.model, "gemini-2.0-flash-lite-preview-02-05");
        assert_eq!(resp.raw["candidates"][0]["finishReason"], "STOP");
    }

    #[test]
    fn parse_response_handles_missing_candidates_and_usage() {
        let resp = GeminiAdapter::parse_response(
            DEFAULT_MODEL,
            json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
        );
        assert_eq!(resp.text, "");
        assert_eq!(resp.usage, TokenUsage::default());
        assert_eq!(resp.model, DEFAULT_MODEL);
    }

    #[test]
    fn parse_response_non_text_first_part_yields_empty_text() {
        let resp = GeminiAdapter::parse_response(
            DEFAULT_MODEL,
            json!({
                "candidates": [{ "content": { "parts": [
                    { "functionCall": { "name": "f", "args": {} } },
                    { "text": "later" }
                ] } }],
                "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 2 }
            }),
        );
        assert_eq!(resp.text, "");
        assert_eq!(resp.usage.total_tokens, 5);
    }

    #[test]
    fn normalize_model_adds_prefix() {
        assert_eq!(normalize_model("gemini-2.5-flash".into()), "models/gemini-2.5-flash");
        assert_eq!(normalize_model(DEFAULT_MODEL.into()), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn initialize_requires_api_key() {
        let mut adapter = GeminiAdapter::new();
        let err = adapter.initialize(ClientOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::MissingCredentials { field: "api_key", .. }
        ));
    }

    #[tokio::test]
    async fn empty_message_list_is_rejected() {
        let adapter = initialized().await;
        let err = adapter
            .text_completion(&[], &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidRequest(_)));

        let err = adapter
            .image_recognition(&[], &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn debug_output_hides_api_key() {
        let adapter = initialized().await;
        let debug = format!("{adapter:?}");
        assert!(!debug.contains("g-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(DEFAULT_MODEL));
    }

    #[tokio::test]
    async fn operations_after_close_fail() {
        let mut adapter = initialized().await;
        assert!(adapter.supports_images());
        adapter.close().await.unwrap();
        let err = adapter
            .image_recognition(&[Message::user("x")], &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotInitialized { .. }));
    }
}
