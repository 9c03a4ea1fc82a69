use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::config::retry::RetryConfig;
use aws_sdk_bedrockruntime::config::timeout::TimeoutConfig;
use aws_sdk_bedrockruntime::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde_json::json;

use crate::http;
use crate::{
    ClientOptions, Message, ModelConfig, Provider, ProviderAdapter, Response, Role, TokenUsage,
};
use switchboard_types::{Result, SwitchboardError};

const PROVIDER: &str = "bedrock";
const DEFAULT_MODEL: &str = "amazon.nova-lite-v1:0";
const DEFAULT_REGION: &str = "us-east-1";
const SCHEMA_VERSION: &str = "messages-v1";

// ---------------------------------------------------------------------------
// BedrockAdapter
// ---------------------------------------------------------------------------

/// Adapter for Bedrock `InvokeModel` using the `messages-v1` body schema
/// (Amazon Nova models).
#[derive(Debug, Default)]
pub struct BedrockAdapter {
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    client: aws_sdk_bedrockruntime::Client,
    /// Used only to fetch URL-only images.
    http: reqwest::Client,
    model: String,
}

impl BedrockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| SwitchboardError::NotInitialized {
            provider: PROVIDER.into(),
        })
    }

    fn build_request_body(
        messages: Vec<serde_json::Value>,
        mut system: Vec<serde_json::Value>,
        config: &ModelConfig,
    ) -> serde_json::Value {
        if let Some(prompt) = config.system_text() {
            system.insert(0, json!({ "text": prompt }));
        }

        let mut inference = json!({
            "maxTokens": config.max_tokens,
            "topP": config.top_p,
            "topK": config.top_k,
            "temperature": config.temperature,
        });
        if !config.stop_sequences.is_empty() {
            inference["stopSequences"] = json!(config.stop_sequences);
        }

        let mut body = json!({
            "schemaVersion": SCHEMA_VERSION,
            "messages": messages,
            "inferenceConfig": inference,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        body
    }

    /// Splits a conversation into Bedrock `messages` and `system` blocks.
    /// Bedrock messages only accept `user` and `assistant` roles.
    fn text_messages(
        messages: &[Message],
    ) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
        let mut turns = Vec::with_capacity(messages.len());
        let mut system = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => system.push(json!({ "text": msg.content })),
                Role::User | Role::Assistant => turns.push(json!({
                    "role": msg.role.as_str(),
                    "content": [{ "text": msg.content }],
                })),
            }
        }
        (turns, system)
    }

    async fn image_message(
        &self,
        session: &Session,
        message: &Message,
    ) -> Result<serde_json::Value> {
        let mut content = Vec::with_capacity(message.images.len() + 1);
        for image in &message.images {
            if let Some(data) = http::image_bytes(PROVIDER, &session.http, image).await? {
                content.push(json!({
                    "image": {
                        "format": image.format,
                        "source": { "bytes": http::encode_base64(&data) },
                    }
                }));
            }
        }
        if !message.content.is_empty() {
            content.push(json!({ "text": message.content }));
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::System => "user",
        };
        Ok(json!({ "role": role, "content": content }))
    }

    fn parse_response(model: &str, body: serde_json::Value) -> Response {
        let text = body["output"]["message"]["content"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage_obj = &body["usage"];
        let input_tokens = usage_obj["inputTokens"].as_u64().unwrap_or(0);
        let output_tokens = usage_obj["outputTokens"].as_u64().unwrap_or(0);
        let total_tokens = usage_obj["totalTokens"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens);

        Response {
            text,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            model: model.to_string(),
            raw: body,
        }
    }

    async fn invoke(&self, session: &Session, body: serde_json::Value) -> Result<Response> {
        let payload = serde_json::to_vec(&body)?;
        tracing::debug!(
            provider = PROVIDER,
            model = %session.model,
            bytes = payload.len(),
            "InvokeModel request"
        );

        let output = session
            .client
            .invoke_model()
            .model_id(&session.model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send()
            .await
            .map_err(|e| {
                let status = e.raw_response().map(|r| r.status().as_u16());
                map_sdk_error(status, DisplayErrorContext(&e).to_string())
            })?;

        let json: serde_json::Value = serde_json::from_slice(output.body().as_ref()).map_err(|e| {
            SwitchboardError::ProviderError {
                provider: PROVIDER.into(),
                status: 200,
                message: format!("Failed to parse response JSON: {e}"),
            }
        })?;

        Ok(Self::parse_response(&session.model, json))
    }
}

fn map_sdk_error(status: Option<u16>, message: String) -> SwitchboardError {
    match status {
        Some(401 | 403) => SwitchboardError::AuthError {
            provider: PROVIDER.into(),
        },
        Some(status) => SwitchboardError::ProviderError {
            provider: PROVIDER.into(),
            status,
            message: format!("error calling Bedrock API: {message}"),
        },
        None => SwitchboardError::Transport {
            provider: PROVIDER.into(),
            message: format!("error calling Bedrock API: {message}"),
        },
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SwitchboardError::MissingCredentials {
            provider: PROVIDER.into(),
            field,
        })
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    async fn initialize(&mut self, options: ClientOptions) -> Result<()> {
        let access_key = required(options.access_key, "access_key")?;
        let secret_key = required(options.secret_key, "secret_key")?;
        let region = options
            .region
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = Credentials::new(access_key, secret_key, None, None, "switchboard");
        let mut config = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());
        if let Some(url) = options.endpoint_url {
            config = config.endpoint_url(url);
        }
        if let Some(secs) = options.timeout_secs {
            config = config.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(secs))
                    .build(),
            );
        }

        self.session = Some(Session {
            client: aws_sdk_bedrockruntime::Client::from_conf(config.build()),
            http: http::build_client(PROVIDER, options.timeout_secs)?,
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
        let (turns, system) = Self::text_messages(messages);
        let body = Self::build_request_body(turns, system, config);
        self.invoke(session, body).await
    }

    async fn image_recognition(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Response> {
        let session = self.session()?;
        let message = messages
            .last()
            .ok_or_else(|| SwitchboardError::InvalidRequest("no messages provided".into()))?;
        let turn = self.image_message(session, message).await?;
        let body = Self::build_request_body(vec![turn], Vec::new(), config);
        self.invoke(session, body).await
    }

    async fn close(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }

    fn provider(&self) -> Provider {
        Provider::Bedrock
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

    fn artist_config() -> ModelConfig {
        ModelConfig::default()
            .with_temperature(0.3)
            .with_top_p(0.1)
            .with_top_k(20)
            .with_max_tokens(300)
            .with_system_prompt("You are an expert artist.")
    }

    async fn initialized() -> BedrockAdapter {
        let mut adapter = BedrockAdapter::new();
        adapter
            .initialize(ClientOptions::default().with_aws_credentials("AKIDEXAMPLE", "secret"))
            .await
            .unwrap();
        adapter
    }

    #[test]
    fn build_request_body_for_text() {
        let messages = vec![
            Message::system("Answer in one sentence."),
            Message::user("What is Rust?"),
            Message::assistant("A systems language."),
            Message::user("Who maintains it?"),
        ];
        let (turns, system) = BedrockAdapter::text_messages(&messages);
        let body = BedrockAdapter::build_request_body(turns, system, &artist_config());

        assert_eq!(body["schemaVersion"], "messages-v1");

        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"], json!([{ "text": "What is Rust?" }]));
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[2]["content"][0]["text"], "Who maintains it?");

        assert_eq!(
            body["system"],
            json!([
                { "text": "You are an expert artist." },
                { "text": "Answer in one sentence." }
            ])
        );

        let inference = &body["inferenceConfig"];
        assert_eq!(inference["maxTokens"], 300);
        assert_eq!(inference["topK"], 20);
        assert!((inference["topP"].as_f64().unwrap() - 0.1).abs() < 0.01);
        assert!((inference["temperature"].as_f64().unwrap() - 0.3).abs() < 0.01);
        assert!(inference.get("stopSequences").is_none());
    }

    #[test]
    fn build_request_body_omits_empty_system_and_adds_stops() {
        let config = ModelConfig::default().with_stop_sequences(vec!["</answer>".to_string()]);
        let (turns, system) = BedrockAdapter::text_messages(&[Message::user("hi")]);
        let body = BedrockAdapter::build_request_body(turns, system, &config);
        assert!(body.get("system").is_none());
        assert_eq!(body["inferenceConfig"]["stopSequences"], json!(["</answer>"]));
    }

    #[tokio::test]
    async fn image_message_puts_images_before_text() {
        let adapter = initialized().await;
        let session = adapter.session().unwrap();
        let msg = Message::user("What are the images")
            .with_image(Image::from_bytes("jpeg", b"abc".to_vec()))
            .with_image(Image::from_bytes("png", b"hello".to_vec()));

        let turn = adapter.image_message(session, &msg).await.unwrap();
        assert_eq!(turn["role"], "user");
        let content = turn["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["image"]["format"], "jpeg");
        assert_eq!(content[0]["image"]["source"]["bytes"], "YWJj");
        assert_eq!(content[1]["image"]["format"], "png");
        assert_eq!(content[1]["image"]["source"]["bytes"], "aGVsbG8=");
        assert_eq!(content[2], json!({ "text": "What are the images" }));
    }

    #[test]
    fn parse_response_extracts_text_and_usage() {
        let response_json = json!({
            "output": {
                "message": {
                    "role": "assistant",
                    "content": [
                        { "text": "The first image shows a dog." },
                        { "text": "unread" }
                    ]
                }
            },
            "stopReason": "end_turn",
            "usage": {
                "inputTokens": 1520,
                "outputTokens": 42,
                "totalTokens": 1562
            }
        });

        let resp = BedrockAdapter::parse_response(DEFAULT_MODEL, response_json);
        assert_eq!(resp.text, "The first image shows a dog.");
        assert_eq!(resp.usage.input_tokens, 1520);
        assert_eq!(resp.usage.output_tokens, 42);
        assert_eq!(resp.usage.total_tokens, 1562);
        assert_eq!(resp.model, DEFAULT_MODEL);
        assert_eq!(resp.raw["stopReason"], "end_turn");
    }

    #[test]
    fn parse_response_sums_total_when_absent() {
        let resp = BedrockAdapter::parse_response(
            DEFAULT_MODEL,
            json!({
                "output": { "message": { "content": [] } },
                "usage": { "inputTokens": 10, "outputTokens": 5 }
            }),
        );
        assert_eq!(resp.text, "");
        assert_eq!(resp.usage.total_tokens, 15);
    }

    #[test]
    fn sdk_error_mapping() {
        assert!(matches!(
            map_sdk_error(Some(403), "UnrecognizedClientException".into()),
            SwitchboardError::AuthError { .. }
        ));
        match map_sdk_error(Some(400), "ValidationException: Malformed input".into()) {
            SwitchboardError::ProviderError { status, message, .. } => {
                assert_eq!(status, 400);
                assert!(message.contains("Malformed input"));
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
        assert!(matches!(
            map_sdk_error(None, "dispatch failure".into()),
            SwitchboardError::Transport { .. }
        ));
    }

    #[tokio::test]
    async fn initialize_requires_both_keys() {
        let mut adapter = BedrockAdapter::new();
        let err = adapter.initialize(ClientOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::MissingCredentials { field: "access_key", .. }
        ));

        let mut opts = ClientOptions::default();
        opts.access_key = Some("AKIDEXAMPLE".into());
        let err = adapter.initialize(opts).await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::MissingCredentials { field: "secret_key", .. }
        ));
    }

    #[tokio::test]
    async fn initialize_defaults_model() {
        let adapter = initialized().await;
        assert_eq!(adapter.default_model(), "amazon.nova-lite-v1:0");
        assert!(adapter.supports_images());
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let adapter = BedrockAdapter::new();
        let err = adapter
            .text_completion(&[Message::user("hi")], &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn image_recognition_rejects_empty_messages() {
        let adapter = initialized().await;
        let err = adapter
            .image_recognition(&[], &ModelConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidRequest(_)));
    }
}
