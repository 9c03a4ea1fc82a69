use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ClientOptions, DynProvider, GeminiAdapter, OpenAiAdapter};
use switchboard_types::{Result, SwitchboardError};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// The AI vendors an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Bedrock,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Gemini, Provider::Bedrock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            "bedrock" => Ok(Provider::Bedrock),
            _ => Err(SwitchboardError::UnsupportedProvider(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Constructs the uninitialized adapter for `provider`.
pub fn new_client(provider: &str) -> Result<DynProvider> {
    match provider.parse::<Provider>()? {
        Provider::OpenAi => Ok(DynProvider::new(OpenAiAdapter::new())),
        Provider::Gemini => Ok(DynProvider::new(GeminiAdapter::new())),
        #[cfg(feature = "bedrock")]
        Provider::Bedrock => Ok(DynProvider::new(crate::BedrockAdapter::new())),
        #[cfg(not(feature = "bedrock"))]
        Provider::Bedrock => Err(SwitchboardError::UnsupportedProvider(format!(
            "{provider} (built without the `bedrock` feature)"
        ))),
    }
}

/// Constructs the adapter for `provider` and initializes it with `options`.
pub async fn initialize_client(provider: &str, options: ClientOptions) -> Result<DynProvider> {
    let mut client = new_client(provider)?;
    client.initialize(options).await?;
    tracing::info!(
        provider = client.name(),
        model = client.default_model(),
        "client initialized"
    );
    Ok(client)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
