//! Conversation data model and API payloads.
//!
//! Everything here serializes with camelCase keys and millisecond timestamps,
//! which is the shape the browser client persisted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use kinchat_files::{Attachment, AttachmentKind, StoredFile};

use crate::store::{DEFAULT_TITLE, title_for};

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    /// Generated or analyzed image shown with the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: now_millis(),
            image_url: None,
            attachments: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A titled, ordered list of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`. Never moves it backwards.
    pub fn touch(&mut self) {
        self.updated_at = self.updated_at.max(now_millis());
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Derive the title from the first user message while it is still the default.
    pub fn refresh_title(&mut self) {
        if self.title == DEFAULT_TITLE {
            self.title = title_for(&self.messages);
        }
    }

    /// The turns sent upstream for this conversation.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.messages.iter().map(Message::to_turn).collect()
    }
}

/// A message as the relay sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a user can ask the session to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChatIntent {
    Send {
        text: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
    },
    GenerateImage {
        prompt: String,
        #[serde(default)]
        source_image_url: Option<String>,
    },
    AnalyzeImage {
        #[serde(default)]
        prompt: Option<String>,
        image_url: String,
    },
}

impl ChatIntent {
    /// The user message recorded in the conversation for this intent.
    pub fn user_message(&self) -> Message {
        match self {
            ChatIntent::Send { text, attachments } => {
                Message::user(text.clone()).with_attachments(attachments.clone())
            }
            ChatIntent::GenerateImage {
                prompt,
                source_image_url,
            } => {
                let message = Message::user(prompt.clone());
                match source_image_url {
                    Some(url) => message.with_image(url.clone()),
                    None => message,
                }
            }
            ChatIntent::AnalyzeImage { prompt, image_url } => {
                Message::user(prompt.clone().unwrap_or_else(|| DEFAULT_ANALYZE_PROMPT.to_string()))
                    .with_image(image_url.clone())
            }
        }
    }
}

/// Used when an analysis request carries no prompt.
pub const DEFAULT_ANALYZE_PROMPT: &str = "Describe this image in detail, including the main \
     subjects, the setting, the colors and anything else that stands out.";

// ============================================================================
// API payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ChatRequest {
    /// Prior turns plus the optional prompt as the final user turn.
    pub fn into_turns(self) -> Vec<ChatTurn> {
        let mut turns = self.messages;
        if let Some(prompt) = self.prompt.filter(|p| !p.trim().is_empty()) {
            turns.push(ChatTurn::user(prompt));
        }
        turns
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub attachment: Attachment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
