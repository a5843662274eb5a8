//! Conversation Store
//!
//! An append-only log of [`Message`]s mirrored to a JSON file. Every append
//! rewrites the whole document through a temporary file and a rename, so
//! the file on disk is always either the previous or the new version.
//!
//! [`HistoryDirectory`] manages the folder of saved conversations.

use std::path::{Path, PathBuf};

use crate::error::ChatError;
use crate::messages::Message;

/// File name of the conversation written when no other is chosen
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

/// Ordered conversation persisted as a JSON array
#[derive(Debug)]
pub struct ConversationStore {
    path: PathBuf,
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Empty store bound to `path`; nothing is read or written yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            messages: Vec::new(),
        }
    }

    /// Bind to `path` and load whatever it already holds
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::CorruptHistory`] if the file is not a valid
    /// history document, or [`ChatError::Io`] if it cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let mut store = Self::new(path);
        store.messages = store.load_all().await?;
        tracing::debug!(
            path = %store.path.display(),
            messages = store.messages.len(),
            "Opened conversation"
        );
        Ok(store)
    }

    /// Read the backing file
    ///
    /// A missing or whitespace-only file is an empty conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::CorruptHistory`] for unparseable content and
    /// [`ChatError::Io`] for other read failures.
    pub async fn load_all(&self) -> Result<Vec<Message>, ChatError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ChatError::io(&self.path, e)),
        };

        let text = std::str::from_utf8(&bytes).map_err(|e| self.corrupt(e))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(text).map_err(|e| self.corrupt(e))
    }

    /// Append a message and rewrite the file
    ///
    /// On failure the message is removed again, so memory matches disk.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if the file cannot be written.
    pub async fn append(&mut self, message: Message) -> Result<(), ChatError> {
        self.messages.push(message);

        if let Err(e) = self.persist().await {
            self.messages.pop();
            tracing::warn!(path = %self.path.display(), error = %e, "History write failed");
            return Err(e);
        }

        tracing::debug!(
            path = %self.path.display(),
            messages = self.messages.len(),
            "History saved"
        );
        Ok(())
    }

    /// Messages in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    async fn persist(&self) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChatError::io(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(&self.messages)
            .map_err(|e| ChatError::io(&self.path, std::io::Error::other(e)))?;

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| ChatError::io(&tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ChatError::io(&self.path, e));
        }
        Ok(())
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> ChatError {
        ChatError::CorruptHistory {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Folder of saved conversations
#[derive(Clone, Debug)]
pub struct HistoryDirectory {
    dir: PathBuf,
}

impl HistoryDirectory {
    /// Use `dir` as the history folder
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform default: `<data_dir>/localchat/history`
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("localchat").join("history"))
    }

    /// The folder
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of saved conversations (`*.json`), sorted
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if the folder exists but cannot be read.
    pub async fn list(&self) -> Result<Vec<String>, ChatError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ChatError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChatError::io(&self.dir, e))?
        {
            let path = entry.path();
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Resolve a saved conversation name inside the folder
    ///
    /// Directory components are dropped and `.json` is added when missing.
    /// Returns `None` for names with no file component.
    #[must_use]
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let file = Path::new(name.trim()).file_name()?;
        let mut path = self.dir.join(file);
        if path.extension().is_none() {
            path.set_extension("json");
        }
        Some(path)
    }

    /// `<dir>/chat_history.json`
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_HISTORY_FILE)
    }

    /// A fresh file name for a new conversation: `chat-YYYYMMDD-HHMMSS.json`
    #[must_use]
    pub fn new_conversation_path(&self, now: chrono::DateTime<chrono::Local>) -> PathBuf {
        self.dir
            .join(format!("chat-{}.json", now.format("%Y%m%d-%H%M%S")))
    }
}
