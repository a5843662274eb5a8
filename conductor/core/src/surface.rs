//! Renderer Callback Contract
//!
//! A surface is whatever shows the conversation to the user. The pipeline
//! drives it through [`Surface`] callbacks, always from the interface task,
//! and never touches rendering state directly.
//!
//! # Callback Order
//!
//! For one submitted request a surface sees:
//!
//! ```text
//! set_input_enabled(false)
//! on_typing_tick(0)
//! ( on_partial_update | on_typing_tick )*
//! on_typing_stop
//! on_finalized | on_error        (exactly one)
//! set_input_enabled(true)
//! ```

use crate::error::ChatError;
use crate::messages::{Message, NotifyLevel};

/// Rendering layer driven by the streaming pipeline
pub trait Surface {
    /// Replace the in-progress response with the full text received so far
    fn on_partial_update(&mut self, text: &str);

    /// Show the finished, cleaned response
    fn on_finalized(&mut self, message: &Message);

    /// Show a failed exchange
    fn on_error(&mut self, error: &ChatError);

    /// Advance the typing animation to `phase`
    fn on_typing_tick(&mut self, phase: usize);

    /// Hide the typing animation
    fn on_typing_stop(&mut self);

    /// Allow or block new submissions
    fn set_input_enabled(&mut self, enabled: bool);

    /// Non-fatal notice (persistence warnings, unreadable attachments)
    fn on_notify(&mut self, level: NotifyLevel, text: &str) {
        match level {
            NotifyLevel::Info => tracing::info!(notice = text, "Surface notice"),
            NotifyLevel::Warning => tracing::warn!(notice = text, "Surface notice"),
            NotifyLevel::Error => tracing::error!(notice = text, "Surface notice"),
        }
    }
}

/// A callback as recorded by [`EventLog`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// `on_partial_update`
    PartialUpdate(String),
    /// `on_finalized`
    Finalized(Message),
    /// `on_error`, with the error's kind and rendered text
    Error {
        /// `ChatError::kind()`
        kind: &'static str,
        /// `ChatError` display text
        message: String,
    },
    /// `on_typing_tick`
    TypingTick(usize),
    /// `on_typing_stop`
    TypingStop,
    /// `set_input_enabled`
    InputEnabled(bool),
    /// `on_notify`
    Notify(NotifyLevel, String),
}

/// Surface that records every callback, for headless runs and tests
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<SurfaceEvent>,
}

impl EventLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    #[must_use]
    pub fn events(&self) -> &[SurfaceEvent] {
        &self.events
    }

    /// Drain the recorded events
    pub fn take(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of terminal callbacks (`on_finalized` + `on_error`)
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Finalized(_) | SurfaceEvent::Error { .. }))
            .count()
    }

    /// The last partial text shown, if any
    #[must_use]
    pub fn last_partial(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            SurfaceEvent::PartialUpdate(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Surface for EventLog {
    fn on_partial_update(&mut self, text: &str) {
        self.events.push(SurfaceEvent::PartialUpdate(text.to_string()));
    }

    fn on_finalized(&mut self, message: &Message) {
        self.events.push(SurfaceEvent::Finalized(message.clone()));
    }

    fn on_error(&mut self, error: &ChatError) {
        self.events.push(SurfaceEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn on_typing_tick(&mut self, phase: usize) {
        self.events.push(SurfaceEvent::TypingTick(phase));
    }

    fn on_typing_stop(&mut self) {
        self.events.push(SurfaceEvent::TypingStop);
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.events.push(SurfaceEvent::InputEnabled(enabled));
    }

    fn on_notify(&mut self, level: NotifyLevel, text: &str) {
        self.events.push(SurfaceEvent::Notify(level, text.to_string()));
    }
}
