//! Client-side conversation store.
//!
//! Conversations are kept most recently updated first and capped at
//! [`MAX_CONVERSATIONS`]; saving past the cap evicts the least recently
//! updated entries.

mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Conversation, Message, Role};

pub use local::LocalConversationStore;

/// How many conversations are retained.
pub const MAX_CONVERSATIONS: usize = 50;

/// Title of a conversation before it has a user message.
pub const DEFAULT_TITLE: &str = "New conversation";

const TITLE_CHARS: usize = 20;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting conversations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent list of conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// All conversations, most recently updated first.
    async fn list(&self) -> StoreResult<Vec<Conversation>>;

    /// Look up one conversation.
    async fn get(&self, id: &str) -> StoreResult<Option<Conversation>> {
        Ok(self.list().await?.into_iter().find(|c| c.id == id))
    }

    /// Insert or replace by id and move the conversation to the front.
    async fn save(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Remove a conversation. Removing an unknown id is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Title for a conversation: the first user message, cut to 20 characters
/// with `...` appended when longer.
pub fn title_for(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.role == Role::User) else {
        return DEFAULT_TITLE.to_string();
    };

    let content = first.content.as_str();
    match content.char_indices().nth(TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Move `conversation` to the front of `list`, replacing any entry with the
/// same id, then drop entries past `cap`.
pub fn upsert_front(list: &mut Vec<Conversation>, conversation: Conversation, cap: usize) {
    list.retain(|c| c.id != conversation.id);
    list.insert(0, conversation);
    list.truncate(cap);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            ..Conversation::new()
        }
    }

    #[test]
    fn test_title_truncates_long_messages() {
        let messages = vec![Message::user("abcdefghijklmnopqrstuvwxy")];
        assert_eq!(title_for(&messages), "abcdefghijklmnopqrst...");
    }

    #[test]
    fn test_title_keeps_short_messages() {
        let messages = vec![Message::user("abcdefghij")];
        assert_eq!(title_for(&messages), "abcdefghij");

        let exactly_twenty = "a".repeat(20);
        assert_eq!(title_for(&[Message::user(exactly_twenty.clone())]), exactly_twenty);
    }

    #[test]
    fn test_title_counts_characters_not_bytes() {
        let messages = vec![Message::user("今天天气怎么样我们一起去公园散步吧好不好呀朋友们")];
        let title = title_for(&messages);
        assert_eq!(title.chars().count(), 23);
        assert!(title.starts_with("今天天气怎么样"));
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_title_uses_first_user_message() {
        let messages = vec![
            Message::assistant("Welcome!"),
            Message::user("first question"),
            Message::user("second question"),
        ];
        assert_eq!(title_for(&messages), "first question");
        assert_eq!(title_for(&[Message::assistant("hi")]), DEFAULT_TITLE);
        assert_eq!(title_for(&[]), DEFAULT_TITLE);
    }

    #[test]
    fn test_upsert_front_replaces_and_moves() {
        let mut list = vec![conversation("a"), conversation("b"), conversation("c")];

        let mut updated = conversation("c");
        updated.title = "renamed".to_string();
        upsert_front(&mut list, updated, MAX_CONVERSATIONS);

        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(list[0].title, "renamed");
    }

    #[test]
    fn test_upsert_front_evicts_tail() {
        let mut list = vec![conversation("a"), conversation("b")];
        upsert_front(&mut list, conversation("c"), 2);

        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
