//! Environment-driven construction of [`ClientOptions`].

use crate::{ClientOptions, Provider};

pub const TIMEOUT_ENV: &str = "SWITCHBOARD_TIMEOUT_SECS";

impl ClientOptions {
    /// Reads the credentials and model overrides for `provider` from the
    /// process environment. Missing variables stay `None`; the adapter's
    /// `initialize` reports which credential is absent.
    pub fn from_env(provider: Provider) -> Self {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(provider: Provider, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|&k| lookup(k).filter(|v| !v.trim().is_empty()))
        };

        let mut options = match provider {
            Provider::OpenAi => ClientOptions {
                api_key: first(&["OPENAI_API_KEY"]),
                model_id: first(&["OPENAI_MODEL"]),
                endpoint_url: first(&["OPENAI_BASE_URL"]),
                ..Default::default()
            },
            Provider::Gemini => ClientOptions {
                api_key: first(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
                model_id: first(&["GEMINI_MODEL"]),
                ..Default::default()
            },
            Provider::Bedrock => ClientOptions {
                access_key: first(&["AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]),
                secret_key: first(&["AWS_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]),
                region: Some(first(&["AWS_REGION"]).unwrap_or_else(|| "us-east-1".to_string())),
                model_id: first(&["BEDROCK_MODEL"]),
                endpoint_url: first(&["BEDROCK_ENDPOINT_URL"]),
                ..Default::default()
            },
        };

        options.timeout_secs = first(&[TIMEOUT_ENV]).and_then(|v| match v.trim().parse() {
            Ok(secs) => Some(secs),
            Err(_) => {
                tracing::warn!(value = %v, "ignoring invalid {TIMEOUT_ENV}");
                None
            }
        });

        options
    }
}
