//! Test utilities and common setup.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use futures::stream;
use tempfile::TempDir;

use kinchat::api::{self, AppState};
use kinchat::files::FileGateway;
use kinchat::models::ChatTurn;
use kinchat::providers::{
    ChatProvider, GeneratedImage, ImageProvider, InlineImage, ProviderError, ProviderResult,
    UpstreamReply,
};

/// Smallest bytes the gateway will accept as a PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

/// Chat upstream that replies with fixed fragments, or fails before any text.
pub struct ScriptedChat {
    fragments: Option<Vec<String>>,
}

impl ScriptedChat {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: Some(fragments.iter().map(|f| f.to_string()).collect()),
        }
    }

    pub fn failing() -> Self {
        Self { fragments: None }
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, _turns: &[ChatTurn]) -> ProviderResult<UpstreamReply> {
        match self.fragments {
            Some(ref fragments) => {
                let items: Vec<ProviderResult<String>> =
                    fragments.iter().cloned().map(Ok).collect();
                Ok(UpstreamReply::Incremental(Box::pin(stream::iter(items))))
            }
            None => Err(ProviderError::Http {
                provider: "scripted",
                status: 529,
                message: "overloaded".to_string(),
            }),
        }
    }
}

/// Image upstream that always draws the same PNG and describes by size.
pub struct FixedImages;

#[async_trait]
impl ImageProvider for FixedImages {
    async fn generate_image(
        &self,
        _prompt: &str,
        _source: Option<InlineImage>,
    ) -> ProviderResult<GeneratedImage> {
        Ok(GeneratedImage {
            image: InlineImage {
                mime_type: "image/png".to_string(),
                data: PNG_BYTES.to_vec(),
            },
            model: "fixed-image-model".to_string(),
        })
    }

    async fn analyze_image(&self, prompt: &str, image: InlineImage) -> ProviderResult<String> {
        Ok(format!(
            "{prompt}: {} bytes of {}",
            image.data.len(),
            image.mime_type
        ))
    }
}

/// Create a test application. The returned directory holds the public files
/// and must outlive the router.
pub fn test_app_with(chat: impl ChatProvider + 'static) -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let files = FileGateway::new(dir.path());
    let state = AppState::new(Arc::new(chat), Arc::new(FixedImages), files);
    (api::create_router(state), dir)
}

/// Create a test application whose chat upstream replies "He", "llo".
pub fn test_app() -> (Router, TempDir) {
    test_app_with(ScriptedChat::replying(&["He", "llo"]))
}
