//! Inference Server Integration
//!
//! Abstracted access to the model server through a common trait, so the
//! pipeline can run against Ollama or a scripted test backend.
//!
//! # Usage
//!
//! ```ignore
//! use localchat_core::backend::{BackendConfig, ChatBackend, ChatRequest, OllamaBackend};
//!
//! let backend = OllamaBackend::from_config(&BackendConfig::default())?;
//! let mut rx = backend.stream_chat(ChatRequest::new("llama3.2"));
//! while let Some(token) = rx.recv().await { /* ... */ }
//! ```

mod ndjson;
mod ollama;
mod traits;

pub use ndjson::{parse_line, ChatChunk, ChunkMessage, LineDecoder};
pub use ollama::OllamaBackend;
pub use traits::{
    BackendConfig, ChatBackend, ChatRequest, ChatRole, ChatTurn, GenerateRequest,
    GenerateResponse, ModelInfo, StreamingToken,
};
