//! localchat Core - Headless Chat Client for a Local Model Server
//!
//! This crate holds everything about talking to an Ollama server that does
//! not depend on how the conversation is drawn. A terminal UI, a test
//! harness or a one-shot CLI all drive the same pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Surface (renderer)                      │
//! │        TUI DisplayState  /  EventLog  /  anything else       │
//! └───────────────────────────────▲──────────────────────────────┘
//!                                 │ Surface callbacks
//! ┌───────────────────────────────┼──────────────────────────────┐
//! │                       LOCALCHAT CORE                         │
//! │  ┌──────────────┐  ┌──────────┴─────────┐  ┌──────────────┐  │
//! │  │ ChatSession  │◄─┤ StreamingPipeline  │  │ModelRegistry │  │
//! │  │ + Conversa-  │  │ + TypingIndicator  │  │              │  │
//! │  │   tionStore  │  └──────────▲─────────┘  └──────┬───────┘  │
//! │  └──────────────┘             │ mpsc tokens       │          │
//! │                    ┌──────────┴───────────────────▼───────┐  │
//! │                    │      ChatBackend (OllamaBackend)     │  │
//! │                    │      worker task, reqwest stream     │  │
//! │                    └──────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamingPipeline`]: submit input, poll tokens, finalize responses
//! - [`ChatSession`]: model, context token and conversation store
//! - [`ConversationStore`]: append-only JSON history
//! - [`ModelRegistry`]: installed model listing
//! - [`Surface`]: the renderer callback contract
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Instant;
//! use localchat_core::{
//!     BackendConfig, ChatSession, ConversationStore, EventLog, OllamaBackend,
//!     StreamingPipeline,
//! };
//!
//! let backend = OllamaBackend::from_config(&BackendConfig::default())?;
//! let mut pipeline = StreamingPipeline::new(backend);
//! let mut session = ChatSession::new("llama3.2", ConversationStore::open("chat.json").await?);
//! let mut surface = EventLog::new();
//!
//! pipeline.submit(&mut session, "Hello!", vec![], &mut surface, Instant::now()).await?;
//! let outcome = pipeline.run_to_completion(&mut session, &mut surface).await;
//! ```
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod store;
pub mod surface;
pub mod typing;

// Re-exports for convenience
pub use backend::{
    BackendConfig, ChatBackend, ChatRequest, ChatRole, ChatTurn, GenerateRequest,
    GenerateResponse, ModelInfo, OllamaBackend, StreamingToken,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, ConfigError,
    ConfigOverrides, ConfigSource, LocalChatToml,
};
pub use error::ChatError;
pub use messages::{
    is_image_path, Attachment, AttachmentKind, ContextToken, Message, NotifyLevel, RequestId,
    Sender,
};
pub use pipeline::{clean_response, Outcome, RequestHandle, StreamingPipeline, StreamingState};
pub use registry::{ModelListing, ModelRegistry};
pub use session::ChatSession;
pub use store::{ConversationStore, HistoryDirectory, DEFAULT_HISTORY_FILE};
pub use surface::{EventLog, Surface, SurfaceEvent};
pub use typing::{TypingIndicator, TypingState, TYPING_PHASES};
