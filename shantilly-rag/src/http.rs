//! Shared plumbing for the reqwest-based providers.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Which side of the pipeline a provider serves; selects the error variant.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Side {
    Embedding,
    Generation,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Generation => "generation",
        }
    }

    pub(crate) fn error(self, provider: &str, message: impl Into<String>) -> RagError {
        match self {
            Self::Embedding => RagError::embedding(provider, message),
            Self::Generation => RagError::generation(provider, message),
        }
    }
}

/// Build a client whose every request is bounded by `timeout`.
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error, keeping timeouts distinguishable.
pub(crate) fn request_error(
    side: Side,
    provider: &str,
    timeout: Duration,
    e: reqwest::Error,
) -> RagError {
    error!(provider, error = %e, "{} request failed", side.label());
    if e.is_timeout() {
        RagError::Timeout { operation: format!("{} ({provider})", side.label()), limit: timeout }
    } else {
        side.error(provider, format!("request failed: {e}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    /// Ollama: `{"error": "model not found"}`
    Flat { error: String },
    /// OpenAI: `{"error": {"message": "..."}}`
    Nested { error: ErrorDetail },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    side: Side,
    provider: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|e| {
            debug!(provider, %status, error = %e, "failed to read error body");
            String::new()
        });
        let detail = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody::Flat { error }) => error,
            Ok(ErrorBody::Nested { error }) => error.message,
            Err(_) => body,
        };
        error!(provider, %status, "API error");
        return Err(side.error(provider, format!("API returned {status}: {detail}")));
    }

    let bytes = response.bytes().await.map_err(|e| request_error(side, provider, timeout, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        side.error(provider, format!("failed to parse response: {e}"))
    })
}
