//! Transport helpers shared by the reqwest-based adapters.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::Image;
use switchboard_types::{Result, SwitchboardError};

pub(crate) fn build_client(provider: &str, timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(|e| transport(provider, e))
}

pub(crate) fn transport(provider: &str, err: reqwest::Error) -> SwitchboardError {
    SwitchboardError::Transport {
        provider: provider.into(),
        message: err.to_string(),
    }
}

/// Sends a prepared JSON request and returns the decoded body of a
/// successful response.
pub(crate) async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value> {
    let resp = request.send().await.map_err(|e| transport(provider, e))?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| transport(provider, e))?;

    if !status.is_success() {
        return Err(map_error(provider, status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| SwitchboardError::ProviderError {
        provider: provider.into(),
        status: status.as_u16(),
        message: format!("Failed to parse response JSON: {e}"),
    })
}

pub(crate) fn map_error(provider: &str, status: u16, body: &str) -> SwitchboardError {
    match status {
        401 | 403 => SwitchboardError::AuthError {
            provider: provider.into(),
        },
        _ => SwitchboardError::ProviderError {
            provider: provider.into(),
            status,
            message: extract_error_message(body),
        },
    }
}

/// Pulls `error.message` (OpenAI, Gemini) or `message` (Bedrock) out of an
/// error body, falling back to the raw text.
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Resolves an image to its bytes, downloading URL-only images.
/// Returns `None` for an image with neither source.
pub(crate) async fn image_bytes(
    provider: &str,
    client: &reqwest::Client,
    image: &Image,
) -> Result<Option<Vec<u8>>> {
    if let Some(data) = image.data.as_ref().filter(|d| !d.is_empty()) {
        return Ok(Some(data.clone()));
    }
    let Some(url) = image.url.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    tracing::debug!(provider, %url, "downloading image");
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| image_download_error(provider, url, e))?
        .error_for_status()
        .map_err(|e| image_download_error(provider, url, e))?;
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| image_download_error(provider, url, e))?;
    Ok(Some(bytes.to_vec()))
}

fn image_download_error(provider: &str, url: &str, err: reqwest::Error) -> SwitchboardError {
    SwitchboardError::Transport {
        provider: provider.into(),
        message: format!("failed to download image {url}: {err}"),
    }
}

pub(crate) fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}
