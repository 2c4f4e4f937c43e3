//! Application configuration sections.
//!
//! Loaded by the binary with the `config` crate (defaults, then the TOML file,
//! then `KINCHAT__SECTION__KEY` environment overrides). Provider credentials
//! fall back to the conventional vendor environment variables when unset.

use serde::{Deserialize, Serialize};

use kinchat_files::GatewayConfig;

use crate::store::MAX_CONVERSATIONS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub anthropic: AnthropicConfig,
    pub gemini: GeminiConfig,
    pub chat: ChatConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    /// Fill unset credentials from the process environment.
    pub fn apply_env_fallbacks(&mut self) {
        self.apply_env_fallbacks_with(|key| std::env::var(key).ok());
    }

    /// Fill unset credentials using `lookup` to read variables.
    pub fn apply_env_fallbacks_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.anthropic.api_key.is_none() {
            self.anthropic.api_key = non_blank("ANTHROPIC_API_KEY");
        }
        let base_url_is_default = self.anthropic.base_url == default_anthropic_base_url();
        if let Some(base_url) = non_blank("ANTHROPIC_BASE_URL").filter(|_| base_url_is_default) {
            self.anthropic.base_url = base_url;
        }
        if self.gemini.api_key.is_none() {
            self.gemini.api_key = non_blank("GEMINI_API_KEY");
        }
        if self.gemini.proxy.is_none() {
            self.gemini.proxy = non_blank("HTTPS_PROXY").or_else(|| non_blank("https_proxy"));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding `uploads/` and `generated/`. Defaults to `<data dir>/public`.
    pub public_dir: Option<String>,
    pub max_upload_size: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            public_dir: None,
            max_upload_size: gateway.max_upload_size,
            allowed_mime_types: gateway.allowed_mime_types,
        }
    }
}

impl FilesConfig {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_upload_size: self.max_upload_size,
            allowed_mime_types: self.allowed_mime_types.clone(),
        }
    }
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            system_prompt: Some(
                "You are a friendly family AI assistant. Keep answers short and helpful. \
                 If someone wants a picture, tell them to use the image command."
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub image_model: String,
    pub analyze_model: String,
    pub chat_model: String,
    /// HTTPS proxy for Gemini calls
    pub proxy: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            image_model: "gemini-3-pro-image-preview".to_string(),
            analyze_model: "gemini-3-pro-image-preview".to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            proxy: None,
        }
    }
}

/// Which upstream serves `/api/chat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    #[default]
    Anthropic,
    Gemini,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: ChatProviderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// Shared family password that unlocks the session
    pub password: String,
    /// Conversation record file. Defaults to `<data dir>/conversations.json`.
    pub store_file: Option<String>,
    pub storage_key: String,
    pub max_conversations: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            password: "668866".to_string(),
            store_file: None,
            storage_key: "kinchat-conversations".to_string(),
            max_conversations: MAX_CONVERSATIONS,
        }
    }
}
