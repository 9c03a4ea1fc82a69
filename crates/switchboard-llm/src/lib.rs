//! One client interface over OpenAI, Gemini and AWS Bedrock.
//!
//! Provides the `ProviderAdapter` trait, the `DynProvider` wrapper, one
//! adapter per vendor, and `new_client` / `initialize_client` for resolving
//! an adapter from a provider name.

#[cfg(feature = "bedrock")]
mod bedrock;
mod client;
mod config;
mod gemini;
mod http;
mod openai;
mod provider;
mod types;

#[cfg(feature = "bedrock")]
pub use bedrock::BedrockAdapter;
pub use client::*;
pub use config::TIMEOUT_ENV;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;
pub use provider::*;
pub use switchboard_types::{ErrorKind, Result, SwitchboardError};
pub use types::*;
