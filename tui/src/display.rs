//! Display State Types
//!
//! What the terminal shows, driven entirely through the [`Surface`]
//! callbacks of the streaming pipeline plus a few app-level updates
//! (loaded conversations, model list, saved chats).
//!
//! # Design Philosophy
//!
//! The TUI is a thin surface. It never decides when a response is done or
//! what the final text is; it only mirrors what the pipeline tells it.

use std::time::{Duration, Instant};

use ratatui::style::{Modifier, Style};

use localchat_core::{ChatError, Message, NotifyLevel, Sender, Surface, TypingIndicator};

use crate::theme::{self, ASSISTANT_MAGENTA, CODE_LANG, DIM_GRAY, ERROR_RED, USER_GREEN};
use crate::widgets::StyledLine;

/// How long a notice stays in the status bar
const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

/// Display role for messages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayRole {
    /// User input
    User,
    /// Model output
    Assistant,
    /// Local information (help, listings)
    System,
    /// A failed exchange
    Error,
}

impl DisplayRole {
    /// Get the prefix for this role
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::User => "You: ",
            Self::Assistant => "Assistant: ",
            Self::System => "",
            Self::Error => "Error: ",
        }
    }

    fn style(self) -> Style {
        match self {
            Self::User => Style::default().fg(USER_GREEN),
            Self::Assistant => Style::default().fg(ASSISTANT_MAGENTA),
            Self::System => Style::default().fg(DIM_GRAY),
            Self::Error => Style::default().fg(ERROR_RED),
        }
    }
}

impl From<Sender> for DisplayRole {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Self::User,
            Sender::Assistant => Self::Assistant,
        }
    }
}

/// A rendered conversation message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Who sent this message
    pub role: DisplayRole,
    /// The message content
    pub content: String,
    /// Names of attached files
    pub attachments: Vec<String>,
    /// Whether this message is still being streamed
    pub streaming: bool,
}

impl DisplayMessage {
    /// Create a finished display message
    pub fn new(role: DisplayRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
            streaming: false,
        }
    }

    /// Mirror a stored message
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.sender.into(),
            content: message.text.clone(),
            attachments: message.attachments.iter().map(|a| a.name.clone()).collect(),
            streaming: false,
        }
    }
}

/// A transient status-bar notice
#[derive(Clone, Debug)]
pub struct DisplayNotification {
    /// Severity
    pub level: NotifyLevel,
    /// Text
    pub message: String,
    /// When it was raised
    pub raised_at: Instant,
}

/// A piece of message text, either prose or a fenced code block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Plain text
    Text(&'a str),
    /// Fenced code (possibly still open while streaming)
    Code {
        /// Language tag after the opening fence
        lang: Option<&'a str>,
        /// Code body
        body: &'a str,
    },
}

/// Split text on triple-backtick fences
///
/// An unterminated fence runs to the end of the text, so partially
/// streamed code is already shown as code.
#[must_use]
pub fn split_code_blocks(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();

    for (i, part) in text.split("```").enumerate() {
        if i % 2 == 0 {
            if !part.trim().is_empty() {
                segments.push(Segment::Text(part));
            }
            continue;
        }

        let (lang, body) = split_lang(part);
        if lang.is_some() || !body.trim().is_empty() {
            segments.push(Segment::Code { lang, body });
        }
    }

    segments
}

/// Separate a leading language tag from a code body
fn split_lang(part: &str) -> (Option<&str>, &str) {
    let is_tag = |s: &str| {
        !s.is_empty()
            && s.len() <= 16
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '-' | '_'))
    };

    // Raw stream text keeps the newline after the tag
    if let Some((first, rest)) = part.split_once('\n') {
        let first = first.trim();
        if is_tag(first) {
            return (Some(first), rest);
        }
        if first.is_empty() {
            return (None, rest);
        }
        return (None, part);
    }

    // Whitespace-collapsed final text: "```rust fn main() {} ```"
    match part.trim_start().split_once(' ') {
        Some((first, rest)) if is_tag(first) && !rest.trim().is_empty() => (Some(first), rest),
        _ => (None, part),
    }
}

/// The full display state for the TUI
#[derive(Debug)]
pub struct DisplayState {
    /// Conversation messages
    pub messages: Vec<DisplayMessage>,
    /// Typing animation phase while a response is pending
    pub typing_phase: Option<usize>,
    /// Whether the input box accepts submissions
    pub input_enabled: bool,
    /// Selected model
    pub model: String,
    /// Models reported by the server
    pub models: Vec<String>,
    /// Saved conversation names for the sidebar
    pub saved_conversations: Vec<String>,
    /// Name of the conversation being shown
    pub current_conversation: String,
    /// Pending notification (if any)
    pub notification: Option<DisplayNotification>,
    /// Index of the in-progress assistant message
    streaming_idx: Option<usize>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            typing_phase: None,
            input_enabled: true,
            model: String::new(),
            models: Vec::new(),
            saved_conversations: Vec::new(),
            current_conversation: String::new(),
            notification: None,
            streaming_idx: None,
        }
    }
}

impl DisplayState {
    /// Create a new display state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transcript with a stored conversation
    pub fn load_conversation(&mut self, name: impl Into<String>, messages: &[Message]) {
        self.messages = messages.iter().map(DisplayMessage::from_message).collect();
        self.current_conversation = name.into();
        self.typing_phase = None;
        self.streaming_idx = None;
    }

    /// Show the user's own message
    pub fn push_user(&mut self, message: &Message) {
        self.messages.push(DisplayMessage::from_message(message));
    }

    /// Show local information
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.messages.push(DisplayMessage::new(DisplayRole::System, text));
    }

    /// Set a status-bar notice
    pub fn notify(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.notification = Some(DisplayNotification {
            level,
            message: message.into(),
            raised_at: Instant::now(),
        });
    }

    /// Drop the notice once it has been shown long enough
    pub fn expire_notification(&mut self, now: Instant) {
        if self
            .notification
            .as_ref()
            .is_some_and(|n| now.saturating_duration_since(n.raised_at) >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
    }

    /// Whether a streamed response is currently on screen
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming_idx.is_some()
    }

    /// Status bar text (without the notice)
    #[must_use]
    pub fn status_text(&self) -> String {
        let model = if self.model.is_empty() {
            "no model (use /model <name>)"
        } else {
            &self.model
        };
        let state = match self.typing_phase {
            Some(phase) => TypingIndicator::frame(phase),
            None if self.input_enabled => "ready",
            None => "waiting",
        };
        format!(" {model} | {state} | /help | Esc to quit")
    }

    /// Wrap the transcript into styled lines for a given width
    #[must_use]
    pub fn transcript_lines(&self, width: usize) -> Vec<StyledLine> {
        let width = width.max(10);
        let mut lines = Vec::new();

        for msg in &self.messages {
            let base = msg.role.style();
            let mut first = true;

            for segment in split_code_blocks(&msg.content) {
                match segment {
                    Segment::Text(text) => {
                        let content = if first {
                            format!("{}{}", msg.role.prefix(), text.trim())
                        } else {
                            text.trim().to_string()
                        };
                        for line in content.lines() {
                            for wrapped in textwrap::wrap(line, width) {
                                lines.push((wrapped.into_owned(), base));
                            }
                        }
                    }
                    Segment::Code { lang, body } => {
                        if first {
                            lines.push((msg.role.prefix().trim_end().to_string(), base));
                        }
                        let tag = lang.unwrap_or("code");
                        lines.push((
                            format!("┌─ {tag}"),
                            Style::default().fg(CODE_LANG).add_modifier(Modifier::DIM),
                        ));
                        for line in body.trim_matches('\n').lines() {
                            for wrapped in textwrap::wrap(line, width.saturating_sub(2).max(1)) {
                                lines.push((format!("│ {wrapped}"), theme::code_style()));
                            }
                        }
                        lines.push(("└─".to_string(), Style::default().fg(CODE_LANG)));
                    }
                }
                first = false;
            }

            if first {
                // Nothing but whitespace so far
                lines.push((msg.role.prefix().trim_end().to_string(), base));
            }
            if msg.streaming {
                if let Some((last, _)) = lines.last_mut() {
                    last.push('_');
                }
            }
            if !msg.attachments.is_empty() {
                lines.push((
                    format!("  [attached: {}]", msg.attachments.join(", ")),
                    Style::default().fg(DIM_GRAY),
                ));
            }
            lines.push((String::new(), Style::default()));
        }

        lines
    }

    /// The in-progress reply, wherever local lines have pushed it
    fn streaming_message(&mut self) -> Option<&mut DisplayMessage> {
        let idx = self.streaming_idx?;
        self.messages.get_mut(idx).filter(|m| m.streaming)
    }

    /// Mark the in-progress reply done and return it
    fn finish_streaming(&mut self) -> Option<&mut DisplayMessage> {
        let idx = self.streaming_idx.take()?;
        let msg = self.messages.get_mut(idx).filter(|m| m.streaming)?;
        msg.streaming = false;
        Some(msg)
    }
}

impl Surface for DisplayState {
    fn on_partial_update(&mut self, text: &str) {
        if let Some(msg) = self.streaming_message() {
            text.clone_into(&mut msg.content);
        } else {
            let mut msg = DisplayMessage::new(DisplayRole::Assistant, text);
            msg.streaming = true;
            self.streaming_idx = Some(self.messages.len());
            self.messages.push(msg);
        }
    }

    fn on_finalized(&mut self, message: &Message) {
        if let Some(msg) = self.finish_streaming() {
            msg.content.clone_from(&message.text);
        } else {
            self.messages.push(DisplayMessage::from_message(message));
        }
    }

    fn on_error(&mut self, error: &ChatError) {
        self.finish_streaming();
        self.messages
            .push(DisplayMessage::new(DisplayRole::Error, error.to_string()));
    }

    fn on_typing_tick(&mut self, phase: usize) {
        self.typing_phase = Some(phase);
    }

    fn on_typing_stop(&mut self) {
        self.typing_phase = None;
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn on_notify(&mut self, level: NotifyLevel, text: &str) {
        tracing::debug!(?level, notice = text, "Notice");
        self.notify(level, text);
    }
}
