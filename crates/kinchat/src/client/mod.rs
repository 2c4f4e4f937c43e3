//! HTTP client for the kinchat API and the chat session built on top of it.

mod session;
pub mod sse;

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, multipart};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AnalyzeRequest, AnalyzeResponse, Attachment, ChatRequest, ChatTurn, HealthResponse,
    ImageRequest, ImageResponse, UploadResponse,
};
use crate::store::StoreError;

pub use session::{ChatSession, ERROR_REPLY};
pub use sse::{Frame, FrameDecoder};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors surfaced to client code.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("server error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    /// The chat stream ended before the end-of-stream marker.
    #[error("chat stream closed before completion")]
    StreamClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session is locked")]
    Locked,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin wrapper over the kinchat HTTP API.
#[derive(Debug, Clone)]
pub struct KinchatClient {
    http: Client,
    base_url: String,
}

impl KinchatClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        let response = self.http.get(self.url("/api/health")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Stream a chat reply. Each fragment is handed to `on_fragment` as it
    /// arrives and the concatenated text is returned once the stream ends.
    pub async fn chat_stream<F>(&self, turns: Vec<ChatTurn>, mut on_fragment: F) -> ClientResult<String>
    where
        F: FnMut(&str),
    {
        let request = ChatRequest {
            messages: turns,
            prompt: None,
        };
        let response = self
            .http
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await?;
        let response = check(response).await?;

        let mut decoder = FrameDecoder::new();
        let mut reply = String::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            for frame in decoder.push(&chunk?)? {
                if let Frame::Text(text) = frame {
                    on_fragment(&text);
                    reply.push_str(&text);
                }
            }
            if decoder.is_done() {
                break;
            }
        }

        decoder.finish()?;
        debug!(chars = reply.chars().count(), "Chat stream complete");
        Ok(reply)
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        source_image_url: Option<&str>,
    ) -> ClientResult<ImageResponse> {
        let request = ImageRequest {
            prompt: prompt.to_string(),
            source_image_url: source_image_url.map(str::to_string),
        };
        let response = self
            .http
            .post(self.url("/api/image"))
            .json(&request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Returns the analysis text.
    pub async fn analyze_image(&self, prompt: Option<&str>, image_url: &str) -> ClientResult<String> {
        let request = AnalyzeRequest {
            prompt: prompt.map(str::to_string),
            image_url: image_url.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/analyze"))
            .json(&request)
            .send()
            .await?;
        let body: AnalyzeResponse = check(response).await?.json().await?;
        Ok(body.text)
    }

    /// Upload a local file as an attachment.
    pub async fn upload(&self, path: &Path) -> ClientResult<Attachment> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime.essence_str())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = check(response).await?.json().await?;
        Ok(body.attachment)
    }
}

/// Turn a non-success response into [`ClientError::Api`].
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(ClientError::Api { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(frames: &[&str]) -> String {
        frames.iter().map(|f| format!("data: {f}\n\n")).collect()
    }

    #[tokio::test]
    async fn test_chat_stream_collects_fragments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"messages": [{"role": "user", "content": "hi"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"{"text":"He"}"#, r#"{"text":"llo"}"#, "[DONE]"]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let client = KinchatClient::new(server.uri()).unwrap();
        let mut seen = Vec::new();
        let reply = client
            .chat_stream(vec![ChatTurn::user("hi")], |fragment| seen.push(fragment.to_string()))
            .await
            .unwrap();

        assert_eq!(reply, "Hello");
        assert_eq!(seen, vec!["He", "llo"]);
    }

    #[tokio::test]
    async fn test_health_reports_server_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ok", "version": "0.1.0"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = KinchatClient::new(server.uri()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, "0.1.0");
    }

    #[tokio::test]
    async fn test_health_surfaces_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = KinchatClient::new(server.uri()).unwrap();
        match client.health().await.unwrap_err() {
            ClientError::Api { status, message } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_stream_without_marker_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&[r#"{"text":"He"}"#]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = KinchatClient::new(server.uri()).unwrap();
        let result = client.chat_stream(vec![ChatTurn::user("hi")], |_| {}).await;
        assert!(matches!(result, Err(ClientError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/image"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "error": "gemini returned 429: quota exceeded",
                "code": "BAD_GATEWAY"
            })))
            .mount(&server)
            .await;

        let client = KinchatClient::new(server.uri()).unwrap();
        let err = client.generate_image("a kite", None).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(message, "gemini returned 429: quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analyze"))
            .and(body_partial_json(json!({"imageUrl": "/api/file/uploads/2025/01/a.png"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "text": "A red kite."})),
            )
            .mount(&server)
            .await;

        let client = KinchatClient::new(format!("{}/", server.uri())).unwrap();
        let text = client
            .analyze_image(None, "/api/file/uploads/2025/01/a.png")
            .await
            .unwrap();
        assert_eq!(text, "A red kite.");
    }

    #[tokio::test]
    async fn test_upload_sends_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "attachment": {
                    "id": "abc",
                    "type": "image",
                    "filename": "kite.png",
                    "url": "/api/file/uploads/2025/01/abc.png",
                    "mimeType": "image/png",
                    "size": 4,
                    "uploadedAt": 1735689600000_i64
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kite.png");
        std::fs::write(&file, b"\x89PNG").unwrap();

        let client = KinchatClient::new(server.uri()).unwrap();
        let attachment = client.upload(&file).await.unwrap();
        assert_eq!(attachment.url, "/api/file/uploads/2025/01/abc.png");
        assert_eq!(attachment.filename, "kite.png");
    }
}
