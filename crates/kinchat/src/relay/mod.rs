//! Stream relay.
//!
//! Turns an upstream reply into the normalized event sequence served by
//! `/api/chat`: zero or more `Text` events in arrival order followed by
//! exactly one `Done`. A mid-stream failure ends the sequence with a single
//! `Err` and no `Done`.

pub mod sse;

use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use thiserror::Error;
use tracing::warn;

use crate::providers::{FragmentStream, ProviderError, UpstreamReply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Text(String),
    Done,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream failed mid-stream: {0}")]
    Upstream(#[from] ProviderError),

    #[error("failed to encode event: {0}")]
    Encode(String),
}

pub type RelayStream = Pin<Box<dyn Stream<Item = Result<RelayEvent, RelayError>> + Send>>;

/// Relay an upstream reply.
pub fn relay(reply: UpstreamReply) -> RelayStream {
    match reply {
        UpstreamReply::SingleShot(text) => Box::pin(stream::iter([
            Ok(RelayEvent::Text(text)),
            Ok(RelayEvent::Done),
        ])),
        UpstreamReply::Incremental(fragments) => relay_fragments(fragments),
    }
}

enum State {
    Streaming(FragmentStream),
    Finished,
}

fn relay_fragments(fragments: FragmentStream) -> RelayStream {
    Box::pin(stream::unfold(
        State::Streaming(fragments),
        |state| async move {
            let State::Streaming(mut fragments) = state else {
                return None;
            };

            loop {
                match fragments.next().await {
                    Some(Ok(text)) if text.is_empty() => continue,
                    Some(Ok(text)) => {
                        return Some((Ok(RelayEvent::Text(text)), State::Streaming(fragments)));
                    }
                    Some(Err(err)) => {
                        warn!("Relay aborted: {}", err);
                        return Some((Err(RelayError::Upstream(err)), State::Finished));
                    }
                    None => return Some((Ok(RelayEvent::Done), State::Finished)),
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: Vec<Result<&str, ProviderError>>) -> FragmentStream {
        let items: Vec<_> = items
            .into_iter()
            .map(|item| item.map(str::to_string))
            .collect();
        Box::pin(stream::iter(items))
    }

    fn stream_failure() -> ProviderError {
        ProviderError::Stream {
            provider: "test",
            message: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_two_fragments_then_done() {
        let events: Vec<_> = relay(UpstreamReply::Incremental(fragments(vec![
            Ok("He"),
            Ok("llo"),
        ])))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(
            events,
            vec![
                RelayEvent::Text("He".to_string()),
                RelayEvent::Text("llo".to_string()),
                RelayEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let events: Vec<_> = relay(UpstreamReply::Incremental(fragments(vec![
            Ok(""),
            Ok("a"),
            Ok(""),
        ])))
        .map(Result::unwrap)
        .collect()
        .await;

        assert_eq!(events, vec![RelayEvent::Text("a".to_string()), RelayEvent::Done]);
    }

    #[tokio::test]
    async fn test_empty_upstream_still_finishes() {
        let events: Vec<_> = relay(UpstreamReply::Incremental(fragments(vec![])))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(events, vec![RelayEvent::Done]);
    }

    #[tokio::test]
    async fn test_single_shot_is_one_text_event() {
        let events: Vec<_> = relay(UpstreamReply::SingleShot("whole answer".to_string()))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(
            events,
            vec![RelayEvent::Text("whole answer".to_string()), RelayEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_without_done() {
        let items: Vec<_> = relay(UpstreamReply::Incremental(fragments(vec![
            Ok("He"),
            Err(stream_failure()),
            Ok("never relayed"),
        ])))
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &RelayEvent::Text("He".to_string()));
        assert!(matches!(items[1], Err(RelayError::Upstream(_))));
    }
}
