//! Chat Backend Traits
//!
//! Trait definitions for the inference server. This abstraction lets the
//! pipeline run against the real Ollama server or a scripted test backend
//! without changing core logic.
//!
//! # Design Philosophy
//!
//! The ChatBackend trait provides a common interface for:
//! - Starting a streaming chat exchange on a worker task
//! - Single-shot (non-streaming) generation
//! - Querying available models
//!
//! Implementations handle provider-specific details (API formats, endpoints).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::messages::ContextToken;

/// Token stream events from a chat backend
#[derive(Debug)]
pub enum StreamingToken {
    /// A fragment of assistant text, in arrival order
    Fragment(String),
    /// The server returned a context token
    Context(ContextToken),
    /// The server marked the response complete (or closed the stream)
    Done,
    /// The exchange failed; no further tokens follow
    Error(ChatError),
}

/// Role of a chat turn on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions
    System,
    /// User input
    User,
    /// Model output
    Assistant,
}

/// One entry of the `messages` array sent to `/api/chat`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who is speaking
    pub role: ChatRole,
    /// Text content
    pub content: String,
    /// Base64-encoded images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatTurn {
    /// Create a text-only turn
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Attach base64 images
    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A chat request
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// Conversation turns to send
    pub messages: Vec<ChatTurn>,
    /// Context token from the previous exchange
    pub context: Option<ContextToken>,
}

impl ChatRequest {
    /// Create a request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a turn
    #[must_use]
    pub fn with_turn(mut self, turn: ChatTurn) -> Self {
        self.messages.push(turn);
        self
    }

    /// Set context
    #[must_use]
    pub fn with_context(mut self, context: Option<ContextToken>) -> Self {
        self.context = context;
        self
    }
}

/// Single-shot generation request (`/api/generate`, no streaming)
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// Model to use
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Context token from the previous exchange
    pub context: Option<ContextToken>,
}

/// Response from a single-shot generation
#[derive(Clone, Debug)]
pub struct GenerateResponse {
    /// The response text
    pub content: String,
    /// Context token to thread into the next request
    pub context: Option<ContextToken>,
    /// Response generation time in milliseconds
    pub duration_ms: u64,
}

/// Information about an available model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Model size in bytes (if known)
    pub size: Option<u64>,
    /// Parameter count label (if known)
    pub parameters: Option<String>,
}

/// Chat backend trait
///
/// Implement this trait to add support for a different inference server.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Start a streaming exchange on a worker task
    ///
    /// Returns immediately; the caller never waits on network I/O. The
    /// receiver yields fragments and context tokens followed by exactly one
    /// terminal `Done` or `Error`.
    fn stream_chat(&self, request: ChatRequest) -> mpsc::Receiver<StreamingToken>;

    /// Send a prompt and wait for the complete response (non-streaming)
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError>;
}

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    /// Direct Ollama connection
    Ollama {
        /// Host name, or a full `http(s)://` base URL
        host: String,
        /// Port number (ignored when `host` is a URL)
        port: u16,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Ollama {
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

impl BackendConfig {
    /// Create Ollama configuration
    pub fn ollama(host: impl Into<String>, port: u16) -> Self {
        Self::Ollama {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the server, without trailing slash
    #[must_use]
    pub fn base_url(&self) -> String {
        match self {
            Self::Ollama { host, port } => {
                if host.starts_with("http://") || host.starts_with("https://") {
                    host.trim_end_matches('/').to_string()
                } else {
                    format!("http://{host}:{port}")
                }
            }
        }
    }
}
