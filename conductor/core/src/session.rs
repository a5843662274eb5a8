//! Session Management
//!
//! The explicit state of one conversation: which model it talks to, the
//! server's context token, an optional system prompt and the store the
//! messages are persisted to.
//!
//! # Design Philosophy
//!
//! A session is owned by the interface task and passed by `&mut` to the
//! pipeline, so every mutation happens in one place and no locking is
//! needed. Starting a new conversation or resuming a saved one swaps the
//! store and clears the context token.

use std::path::PathBuf;

use crate::error::ChatError;
use crate::messages::{ContextToken, Message};
use crate::store::ConversationStore;

/// A conversation session
#[derive(Debug)]
pub struct ChatSession {
    model: String,
    system_prompt: Option<String>,
    context: Option<ContextToken>,
    store: ConversationStore,
}

impl ChatSession {
    /// Create a session over an already opened store
    pub fn new(model: impl Into<String>, store: ConversationStore) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            context: None,
            store,
        }
    }

    /// Set the system prompt sent ahead of each user turn
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    /// Selected model
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Select a model; takes effect on the next request
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        tracing::debug!(from = %self.model, to = %model, "Model changed");
        self.model = model;
    }

    /// System prompt, if configured
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Context token from the latest exchange
    #[must_use]
    pub fn context(&self) -> Option<&ContextToken> {
        self.context.as_ref()
    }

    /// Replace the context token
    pub fn set_context(&mut self, context: Option<ContextToken>) {
        self.context = context;
    }

    /// Conversation so far
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Append and persist a message
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if the history file cannot be written; the
    /// message is then not part of the conversation.
    pub async fn record(&mut self, message: Message) -> Result<(), ChatError> {
        self.store.append(message).await
    }

    /// Switch to a fresh conversation
    pub fn start_new(&mut self, store: ConversationStore) {
        tracing::info!(path = %store.path().display(), "Starting new conversation");
        self.store = store;
        self.context = None;
    }

    /// Switch to a saved conversation
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::CorruptHistory`] or [`ChatError::Io`]; the current
    /// conversation is left untouched in that case.
    pub async fn resume(&mut self, path: impl Into<PathBuf>) -> Result<(), ChatError> {
        let store = ConversationStore::open(path).await?;
        tracing::info!(
            path = %store.path().display(),
            messages = store.len(),
            "Resumed conversation"
        );
        self.store = store;
        self.context = None;
        Ok(())
    }
}
