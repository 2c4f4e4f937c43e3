//! Application state shared across handlers.

use std::sync::Arc;

use kinchat_files::FileGateway;

use crate::providers::{ChatProvider, ImageProvider};

/// Immutable after startup; cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<dyn ChatProvider>,
    pub images: Arc<dyn ImageProvider>,
    pub files: FileGateway,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        images: Arc<dyn ImageProvider>,
        files: FileGateway,
    ) -> Self {
        Self {
            chat,
            images,
            files,
            cors_origins: Arc::new(Vec::new()),
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Arc::new(origins);
        self
    }
}
