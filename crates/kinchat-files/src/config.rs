use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum file size for uploads (in bytes)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// MIME types accepted by the upload endpoint
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl GatewayConfig {
    /// Check if a MIME type is on the allow-list. The match is exact.
    pub fn is_allowed_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }

    /// Body limit for the upload route: the file limit plus room for multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        let overhead = 1024 * 1024;
        usize::try_from(self.max_upload_size)
            .unwrap_or(usize::MAX)
            .saturating_add(overhead)
    }
}
