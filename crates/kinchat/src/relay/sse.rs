//! SSE framing for relay events.
//!
//! `Text(t)` becomes `data: {"text":"<t>"}` and `Done` becomes `data: [DONE]`,
//! each followed by a blank line. No keep-alive comments are sent.

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::{RelayError, RelayEvent, RelayStream};

/// Payload of the end-of-stream frame.
pub const DONE_MARKER: &str = "[DONE]";

/// JSON payload of a text frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFrame {
    pub text: String,
}

pub fn to_event(event: RelayEvent) -> Result<Event, RelayError> {
    match event {
        RelayEvent::Text(text) => Event::default()
            .json_data(TextFrame { text })
            .map_err(|e| RelayError::Encode(e.to_string())),
        RelayEvent::Done => Ok(Event::default().data(DONE_MARKER)),
    }
}

/// Wrap relay events as an SSE response body. An `Err` item aborts the body.
pub fn into_sse(
    events: RelayStream,
) -> Sse<impl Stream<Item = Result<Event, RelayError>> + Send + 'static> {
    Sse::new(events.map(|item| item.and_then(to_event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FragmentStream, ProviderError, UpstreamReply};
    use crate::relay::relay;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;
    use futures::stream;

    #[tokio::test]
    async fn test_wire_framing() {
        let fragments: FragmentStream = Box::pin(stream::iter(vec![
            Ok("He".to_string()),
            Ok("llo \"quoted\"".to_string()),
        ]));
        let response = into_sse(relay(UpstreamReply::Incremental(fragments))).into_response();

        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "data: {\"text\":\"He\"}\n\ndata: {\"text\":\"llo \\\"quoted\\\"\"}\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts_body() {
        let fragments: FragmentStream = Box::pin(stream::iter(vec![
            Ok("He".to_string()),
            Err(ProviderError::Stream {
                provider: "test",
                message: "reset".to_string(),
            }),
        ]));
        let response = into_sse(relay(UpstreamReply::Incremental(fragments))).into_response();

        assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
    }
}
