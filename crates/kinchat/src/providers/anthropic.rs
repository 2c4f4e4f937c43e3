//! Anthropic Messages API client. Replies are streamed over SSE.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ChatProvider, FragmentStream, ProviderError, ProviderResult, UpstreamReply,
    parse_error_message,
};
use crate::config::AnthropicConfig;
use crate::models::{ChatTurn, Role};

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// --- Request types ---

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<RequestMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// --- Stream event types ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop {},
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

enum Step {
    Text(String),
    Skip,
    Stop,
}

fn parse_event(data: &str) -> ProviderResult<Step> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|e| ProviderError::Stream {
        provider: PROVIDER,
        message: format!("malformed event: {e}"),
    })?;

    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Ok(Step::Text(text)),
        StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => Ok(Step::Skip),
        StreamEvent::MessageStop {} => Ok(Step::Stop),
        StreamEvent::Error { error } => Err(ProviderError::Stream {
            provider: PROVIDER,
            message: error.message,
        }),
    }
}

/// Streaming chat client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    system_prompt: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: &AnthropicConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone().filter(|p| !p.is_empty()),
        }
    }

    fn request_body<'a>(&'a self, turns: &'a [ChatTurn]) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: self.system_prompt.as_deref(),
            messages: turns
                .iter()
                .map(|turn| RequestMessage {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &turn.content,
                })
                .collect(),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat(&self, turns: &[ChatTurn]) -> ProviderResult<UpstreamReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("Anthropic"))?;

        let url = format!("{}/messages", self.base_url);
        debug!(url = %url, model = %self.model, turns = turns.len(), "Opening Anthropic stream");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(turns));

        let mut source = EventSource::new(request).map_err(|e| ProviderError::Network {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        match source.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(_))) => {
                source.close();
                return Err(ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    message: "event received before the stream opened".to_string(),
                });
            }
            Some(Err(err)) => {
                source.close();
                return Err(open_error(err).await);
            }
            None => {
                return Err(ProviderError::Network {
                    provider: PROVIDER,
                    message: "stream closed before opening".to_string(),
                });
            }
        }

        Ok(UpstreamReply::Incremental(fragments(source)))
    }
}

/// Map a failure to open the stream to a provider error, reading the
/// upstream error body when there is one.
async fn open_error(err: EventSourceError) -> ProviderError {
    match err {
        EventSourceError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(status = status.as_u16(), "Anthropic rejected request: {}", message);
            ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            }
        }
        EventSourceError::InvalidContentType(content_type, _) => ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: format!("unexpected content type {content_type:?}"),
        },
        EventSourceError::Transport(err) => ProviderError::Network {
            provider: PROVIDER,
            message: err.to_string(),
        },
        other => ProviderError::Network {
            provider: PROVIDER,
            message: other.to_string(),
        },
    }
}

/// Text deltas until `message_stop`. Any other ending is a failure.
fn fragments(source: EventSource) -> FragmentStream {
    Box::pin(stream::unfold(Some(source), |state| async move {
        let mut source = state?;

        loop {
            let failure = match source.next().await {
                None => return None,
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => match parse_event(&message.data) {
                    Ok(Step::Text(text)) => return Some((Ok(text), Some(source))),
                    Ok(Step::Skip) => continue,
                    Ok(Step::Stop) => {
                        source.close();
                        return None;
                    }
                    Err(err) => err,
                },
                Some(Err(EventSourceError::StreamEnded)) => ProviderError::Stream {
                    provider: PROVIDER,
                    message: "stream ended before message_stop".to_string(),
                },
                Some(Err(err)) => ProviderError::Stream {
                    provider: PROVIDER,
                    message: err.to_string(),
                },
            };

            source.close();
            warn!("Anthropic stream failed: {}", failure);
            return Some((Err(failure), None));
        }
    }))
}
