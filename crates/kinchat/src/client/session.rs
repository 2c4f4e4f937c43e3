//! Chat session: access gate, current conversation and persistence.

use tracing::{error, info, warn};

use super::{ClientError, ClientResult, KinchatClient};
use crate::models::{ChatIntent, Conversation, Message};
use crate::store::ConversationStore;

/// Assistant turn recorded when an intent fails.
pub const ERROR_REPLY: &str =
    "Sorry, something went wrong while sending your message. Please try again later.";

/// One user's view of the chat.
///
/// Every operation takes the session mutably, so only one intent is in
/// flight at a time.
pub struct ChatSession {
    client: KinchatClient,
    store: Box<dyn ConversationStore>,
    password: String,
    unlocked: bool,
    current: Option<Conversation>,
}

impl ChatSession {
    pub fn new(
        client: KinchatClient,
        store: Box<dyn ConversationStore>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            password: password.into(),
            unlocked: false,
            current: None,
        }
    }

    pub fn client(&self) -> &KinchatClient {
        &self.client
    }

    /// Unlock with the shared password. Returns whether it matched.
    pub fn unlock(&mut self, password: &str) -> bool {
        self.unlocked = password == self.password;
        if !self.unlocked {
            warn!("Rejected session password");
        }
        self.unlocked
    }

    pub fn lock(&mut self) {
        self.unlocked = false;
        self.current = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn ensure_unlocked(&self) -> ClientResult<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(ClientError::Locked)
        }
    }

    /// Start a fresh conversation. It is persisted with its first message.
    pub fn new_conversation(&mut self) -> ClientResult<&Conversation> {
        self.ensure_unlocked()?;
        Ok(&*self.current.insert(Conversation::new()))
    }

    /// Make a stored conversation current.
    pub async fn open(&mut self, id: &str) -> ClientResult<&Conversation> {
        self.ensure_unlocked()?;
        let conversation = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ClientError::ConversationNotFound(id.to_string()))?;
        Ok(&*self.current.insert(conversation))
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    /// Stored conversations, most recently updated first.
    pub async fn conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.ensure_unlocked()?;
        Ok(self.store.list().await?)
    }

    pub async fn delete(&mut self, id: &str) -> ClientResult<()> {
        self.ensure_unlocked()?;
        self.store.delete(id).await?;
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.current = None;
        }
        Ok(())
    }

    pub async fn dispatch(&mut self, intent: ChatIntent) -> ClientResult<Message> {
        self.dispatch_with(intent, |_| {}).await
    }

    /// Run one intent against the current conversation (or a new one) and
    /// persist the result. Streamed text is passed to `on_fragment`.
    ///
    /// On failure an apology turn is recorded and saved before the error is
    /// returned.
    pub async fn dispatch_with<F>(&mut self, intent: ChatIntent, on_fragment: F) -> ClientResult<Message>
    where
        F: FnMut(&str),
    {
        self.ensure_unlocked()?;

        let mut conversation = self.current.take().unwrap_or_default();
        conversation.push(intent.user_message());

        let (reply, failure) = match self.perform(&intent, &conversation, on_fragment).await {
            Ok(reply) => (reply, None),
            Err(err) => {
                warn!(conversation = %conversation.id, "Intent failed: {}", err);
                (Message::assistant(ERROR_REPLY), Some(err))
            }
        };

        conversation.push(reply.clone());
        conversation.refresh_title();
        let saved = self.store.save(&conversation).await;
        self.current = Some(conversation);

        match (failure, saved) {
            (None, Ok(())) => Ok(reply),
            (None, Err(err)) => Err(err.into()),
            (Some(failure), Ok(())) => Err(failure),
            (Some(failure), Err(err)) => {
                error!("Failed to save conversation after error: {}", err);
                Err(failure)
            }
        }
    }

    async fn perform<F>(
        &self,
        intent: &ChatIntent,
        conversation: &Conversation,
        on_fragment: F,
    ) -> ClientResult<Message>
    where
        F: FnMut(&str),
    {
        match intent {
            ChatIntent::Send { .. } => {
                let text = self
                    .client
                    .chat_stream(conversation.turns(), on_fragment)
                    .await?;
                Ok(Message::assistant(text))
            }
            ChatIntent::GenerateImage {
                prompt,
                source_image_url,
            } => {
                let generated = self
                    .client
                    .generate_image(prompt, source_image_url.as_deref())
                    .await?;
                info!(url = %generated.image_url, model = %generated.model, "Image generated");
                Ok(Message::assistant(format!("Generated with {}", generated.model))
                    .with_image(generated.image_url))
            }
            ChatIntent::AnalyzeImage { prompt, image_url } => {
                let text = self
                    .client
                    .analyze_image(prompt.as_deref(), image_url)
                    .await?;
                Ok(Message::assistant(text))
            }
        }
    }
}
