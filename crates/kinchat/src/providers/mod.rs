//! Upstream model clients.
//!
//! Anthropic streams chat replies over SSE; Gemini answers chat, image
//! generation and image analysis in a single response. Both sit behind the
//! [`ChatProvider`] / [`ImageProvider`] traits so the API layer and tests can
//! swap them out.

mod anthropic;
mod gemini;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use thiserror::Error;

use crate::models::ChatTurn;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Incremental text fragments from an upstream stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = ProviderResult<String>> + Send>>;

/// Errors from upstream model APIs.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Could not reach the upstream.
    #[error("Failed to reach {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    /// Upstream body could not be understood.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    /// The stream failed after it started.
    #[error("{provider} stream failed: {message}")]
    Stream {
        provider: &'static str,
        message: String,
    },

    /// No API key configured.
    #[error("{0} API key is not configured")]
    NotConfigured(&'static str),

    /// Unusable client settings.
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// The response held no image.
    #[error("No image in response{}", .0.as_deref().map(|t| format!(": {t}")).unwrap_or_default())]
    NoImage(Option<String>),

    /// The response held no text.
    #[error("No text in response")]
    NoText,
}

/// How an upstream delivers its reply.
pub enum UpstreamReply {
    /// Fragments arriving over time.
    Incremental(FragmentStream),
    /// One complete text.
    SingleShot(String),
}

impl std::fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamReply::Incremental(_) => f.write_str("Incremental(..)"),
            UpstreamReply::SingleShot(text) => f.debug_tuple("SingleShot").field(text).finish(),
        }
    }
}

/// Raw image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// An image produced by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image: InlineImage,
    pub model: String,
}

/// Text chat upstream.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a reply for `turns`. Errors returned here happen before any
    /// text was produced.
    async fn chat(&self, turns: &[ChatTurn]) -> ProviderResult<UpstreamReply>;
}

/// Image generation and analysis upstream.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate an image from `prompt`, optionally editing `source`.
    async fn generate_image(
        &self,
        prompt: &str,
        source: Option<InlineImage>,
    ) -> ProviderResult<GeneratedImage>;

    /// Describe `image` following `prompt`.
    async fn analyze_image(&self, prompt: &str, image: InlineImage) -> ProviderResult<String>;
}

/// Shared HTTP client for upstream calls. Connect timeout only; replies may
/// stream for as long as the upstream keeps writing.
///
/// Only the given proxy is used. System proxy variables are ignored.
pub fn http_client(proxy: Option<&str>) -> ProviderResult<Client> {
    let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);

    match proxy.filter(|p| !p.trim().is_empty()) {
        Some(proxy) => {
            let proxy = reqwest::Proxy::https(proxy)
                .map_err(|e| ProviderError::InvalidConfig(format!("proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        None => builder = builder.no_proxy(),
    }

    builder
        .build()
        .map_err(|e| ProviderError::InvalidConfig(format!("http client: {e}")))
}

/// Pull a human readable message out of an upstream error body.
///
/// Both vendors use `{"error": {"message": ...}}`.
pub(crate) fn parse_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(parse_error_message(body).as_deref(), Some("invalid x-api-key"));

        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(parse_error_message(body).as_deref(), Some("API key not valid"));

        assert_eq!(parse_error_message(r#"{"error":"plain"}"#).as_deref(), Some("plain"));
        assert_eq!(parse_error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_no_image_message_includes_model_text() {
        let err = ProviderError::NoImage(Some("I can't draw that".to_string()));
        assert_eq!(err.to_string(), "No image in response: I can't draw that");
        assert_eq!(ProviderError::NoImage(None).to_string(), "No image in response");
    }

    #[test]
    fn test_http_client_ignores_blank_proxy() {
        assert!(http_client(None).is_ok());
        assert!(http_client(Some("")).is_ok());
    }

    #[test]
    fn test_http_client_without_proxy_skips_system_proxy() {
        let direct = http_client(None).unwrap();
        assert!(!format!("{direct:?}").contains("proxies"));

        let proxied = http_client(Some("http://127.0.0.1:3128")).unwrap();
        assert!(format!("{proxied:?}").contains("proxies"));
    }
}
