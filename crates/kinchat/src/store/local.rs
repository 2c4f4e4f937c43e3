//! JSON file conversation store.
//!
//! The file holds one keyed record, `{"<storage key>": [Conversation, ...]}`,
//! so several clients or profiles can share a file under different keys.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ConversationStore, MAX_CONVERSATIONS, StoreResult, upsert_front};
use crate::models::Conversation;

type Record = Map<String, Value>;

/// Conversation store backed by a local JSON file.
#[derive(Debug)]
pub struct LocalConversationStore {
    path: PathBuf,
    key: String,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl LocalConversationStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            capacity: MAX_CONVERSATIONS,
            write_lock: Mutex::new(()),
        }
    }

    /// Override the retention cap.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole record. A missing or unreadable record is empty.
    async fn read_record(&self) -> StoreResult<Record> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Record::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(_) => {
                warn!("Conversation record {} is not an object, starting empty", self.path.display());
                Ok(Record::new())
            }
            Err(err) => {
                warn!(
                    "Conversation record {} is corrupt ({}), starting empty",
                    self.path.display(),
                    err
                );
                Ok(Record::new())
            }
        }
    }

    fn conversations_in(&self, record: &Record) -> Vec<Conversation> {
        let Some(value) = record.get(&self.key) else {
            return Vec::new();
        };

        match serde_json::from_value(value.clone()) {
            Ok(conversations) => conversations,
            Err(err) => {
                warn!("Stored conversations under {:?} are unreadable: {}", self.key, err);
                Vec::new()
            }
        }
    }

    /// Replace the file contents via a temp file and rename.
    async fn write_record(&self, record: &Record) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for LocalConversationStore {
    async fn list(&self) -> StoreResult<Vec<Conversation>> {
        let record = self.read_record().await?;
        Ok(self.conversations_in(&record))
    }

    async fn save(&self, conversation: &Conversation) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record().await?;
        let mut conversations = self.conversations_in(&record);
        upsert_front(&mut conversations, conversation.clone(), self.capacity);

        debug!(
            id = %conversation.id,
            stored = conversations.len(),
            "Saving conversation"
        );

        record.insert(self.key.clone(), serde_json::to_value(&conversations)?);
        self.write_record(&record).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record().await?;
        let mut conversations = self.conversations_in(&record);
        let before = conversations.len();
        conversations.retain(|c| c.id != id);

        if conversations.len() == before {
            debug!("Conversation {} not stored, nothing to delete", id);
            return Ok(());
        }

        record.insert(self.key.clone(), serde_json::to_value(&conversations)?);
        self.write_record(&record).await
    }
}
