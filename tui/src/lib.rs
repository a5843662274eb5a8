//! localchat TUI - Terminal surface for the localchat core
//!
//! A full-screen chat window over a local Ollama server.
//!
//! # Architecture
//!
//! - **App**: event loop, owns the session and streaming pipeline
//! - **Display**: `Surface` implementation the pipeline draws through
//! - **Commands**: `/model`, `/attach`, `/load` and friends
//! - **Widgets**: Borderless scrollable text blocks

pub mod app;
pub mod commands;
pub mod display;
pub mod theme;
pub mod widgets;

pub use app::App;
