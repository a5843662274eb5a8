//! Main Application
//!
//! The App owns everything the interface task touches:
//! - Event loop (keyboard, resize, frame tick)
//! - `ChatSession` and `StreamingPipeline` from the core
//! - `DisplayState`, the `Surface` the pipeline draws through
//!
//! Network work happens in tasks spawned by the backend. The loop only
//! drains their results once per frame, so a slow server never blocks input.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use localchat_core::{
    Attachment, ChatConfig, ChatSession, ConversationStore, HistoryDirectory, ModelListing,
    ModelRegistry, NotifyLevel, OllamaBackend, StreamingPipeline, TypingIndicator,
};

use crate::commands::{parse_command, Command, HELP_TEXT};
use crate::display::DisplayState;
use crate::theme::{self, DIM_GRAY, SELECTED, USER_GREEN};
use crate::widgets::{TextBlock, TextBlockState};

/// Input box height (lines, including the separator)
const INPUT_HEIGHT: u16 = 5;

/// Frame interval (~20 FPS keeps streamed text smooth)
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Below this width the sidebar is hidden
const SIDEBAR_MIN_WIDTH: u16 = 80;

/// Sidebar width
const SIDEBAR_WIDTH: u16 = 28;

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    /// Resolved configuration
    config: ChatConfig,

    // === Chat ===
    /// Model, context token and conversation
    session: ChatSession,
    /// Request lifecycle
    pipeline: StreamingPipeline<OllamaBackend>,
    /// Pending model query
    models_rx: Option<oneshot::Receiver<ModelListing>>,
    /// Last model listing
    listing: ModelListing,
    /// Saved conversations folder
    history: HistoryDirectory,

    // === Display ===
    /// What the pipeline has drawn
    display: DisplayState,
    /// Transcript scroll position
    scroll: TextBlockState,

    // === Input State ===
    /// User input buffer
    input_buffer: String,
    /// Attachments for the next message
    pending_attachments: Vec<Attachment>,

    /// Terminal size
    size: (u16, u16),
}

impl App {
    /// Create a new App instance
    ///
    /// Opens the default conversation and starts the model query in the
    /// background.
    pub async fn new(config: ChatConfig) -> anyhow::Result<Self> {
        let size = crossterm::terminal::size()?;

        let backend = OllamaBackend::new(
            config.backend_config().base_url(),
            config.connect_timeout,
            config.request_timeout,
        )?;
        let pipeline = StreamingPipeline::new(backend).with_typing_interval(config.typing_interval);

        let history = HistoryDirectory::new(config.resolved_history_dir());
        let mut display = DisplayState::new();

        let store = match ConversationStore::open(history.default_path()).await {
            Ok(store) => store,
            Err(e) => {
                // Leave the unreadable file alone and write somewhere else
                let fresh = history.new_conversation_path(Local::now());
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    fallback = %fresh.display(),
                    "Default history unusable"
                );
                display.notify(
                    NotifyLevel::Warning,
                    format!("{e}; using {}", conversation_name(&fresh)),
                );
                ConversationStore::new(fresh)
            }
        };

        let session = ChatSession::new(config.default_model.clone().unwrap_or_default(), store)
            .with_system_prompt(config.system_prompt.clone());

        display.model = session.model().to_string();
        display.load_conversation(conversation_name(session.store().path()), session.messages());

        let mut app = Self {
            running: true,
            config,
            session,
            pipeline,
            models_rx: None,
            listing: ModelListing::default(),
            history,
            display,
            scroll: TextBlockState::default(),
            input_buffer: String::new(),
            pending_attachments: Vec::new(),
            size,
        };

        app.refresh_models();
        app.refresh_saved().await;

        tracing::info!(
            server = app.pipeline.backend().base_url(),
            model = app.session.model(),
            history = %app.history.dir().display(),
            "App ready"
        );

        Ok(app)
    }

    /// Main event loop
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();
        let mut frame_tick = tokio::time::interval(FRAME_INTERVAL);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Render initial frame immediately so user sees UI
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events first
                maybe_event = event_stream.next() => match maybe_event {
                    // Only handle Press events (not Release or Repeat)
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key).await;
                    }
                    Some(Ok(Event::Resize(w, h))) => self.size = (w, h),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Terminal event stream failed");
                        self.running = false;
                    }
                    None => self.running = false,
                },

                _ = frame_tick.tick() => {}
            }

            self.update().await;
            self.render(terminal)?;
        }

        Ok(())
    }

    /// Drain background results and age transient state
    async fn update(&mut self) {
        let now = Instant::now();

        self.poll_models();

        if self
            .pipeline
            .poll(&mut self.session, &mut self.display, now)
            .await
            .is_some()
        {
            // The first exchange creates the conversation file
            self.refresh_saved().await;
        }

        self.display.expire_notification(now);
    }

    /// Handle keyboard input
    async fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            // Quit
            KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
            }

            // Submit message or run command
            KeyCode::Enter => self.submit_input().await,

            // Next installed model
            KeyCode::Tab => self.cycle_model(),

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = self.page_size();
                self.scroll.scroll_up(page);
            }
            KeyCode::PageDown => {
                let page = self.page_size();
                self.scroll.scroll_down(page);
            }
            KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll.scroll_to_bottom();
            }

            // Typing
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            _ => {}
        }
    }

    async fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input_buffer);

        if let Some(command) = parse_command(&input) {
            self.run_command(command).await;
            return;
        }
        if input.trim().is_empty() {
            return;
        }
        if self.session.model().is_empty() {
            self.display.notify(
                NotifyLevel::Warning,
                "No model selected; use /model <name> or Tab",
            );
            self.input_buffer = input;
            return;
        }
        if self.pipeline.is_busy() {
            self.display
                .notify(NotifyLevel::Info, "Still waiting for the previous response");
            self.input_buffer = input;
            return;
        }

        let attachments = std::mem::take(&mut self.pending_attachments);
        match self
            .pipeline
            .submit(
                &mut self.session,
                &input,
                attachments,
                &mut self.display,
                Instant::now(),
            )
            .await
        {
            Ok(Some(handle)) => {
                self.display.push_user(&handle.user_message);
                self.scroll.scroll_to_bottom();
            }
            Ok(None) => {}
            Err(e) => {
                self.display.notify(NotifyLevel::Warning, e.to_string());
                self.input_buffer = input;
            }
        }
    }

    async fn run_command(&mut self, command: Command) {
        tracing::debug!(?command, "Command");

        match command {
            Command::Model(name) => self.set_model(name),
            Command::Models => {
                if self.listing.is_empty() {
                    self.display.push_system("No models listed yet (refreshing)");
                } else {
                    let names: Vec<&str> =
                        self.listing.models.iter().map(String::as_str).collect();
                    self.display
                        .push_system(format!("Installed models: {}", names.join(", ")));
                }
                self.refresh_models();
            }
            Command::Attach(path) => self.attach(&expand_home(&path)).await,
            Command::New => {
                if self.reject_while_busy() {
                    return;
                }
                let path = self.history.new_conversation_path(Local::now());
                let name = conversation_name(&path);
                self.session.start_new(ConversationStore::new(path));
                self.display.load_conversation(name.clone(), &[]);
                self.scroll.scroll_to_bottom();
                self.display
                    .notify(NotifyLevel::Info, format!("Started {name}"));
            }
            Command::History => {
                self.refresh_saved().await;
                if self.display.saved_conversations.is_empty() {
                    self.display.push_system(format!(
                        "No saved conversations in {}",
                        self.history.dir().display()
                    ));
                } else {
                    self.display.push_system(format!(
                        "Saved conversations: {}",
                        self.display.saved_conversations.join(", ")
                    ));
                }
            }
            Command::Load(name) => {
                if self.reject_while_busy() {
                    return;
                }
                let Some(path) = self.history.path_for(&name) else {
                    self.display
                        .notify(NotifyLevel::Warning, format!("Not a conversation name: {name}"));
                    return;
                };
                let name = conversation_name(&path);
                if !conversation_exists(&path).await {
                    self.display.notify(
                        NotifyLevel::Warning,
                        format!("No saved conversation named {name}"),
                    );
                    return;
                }
                match self.session.resume(path).await {
                    Ok(()) => {
                        self.display.load_conversation(name.clone(), self.session.messages());
                        self.scroll.scroll_to_bottom();
                        self.display
                            .notify(NotifyLevel::Info, format!("Loaded {name}"));
                    }
                    Err(e) => {
                        tracing::warn!(kind = e.kind(), error = %e, "Load failed");
                        self.display.notify(NotifyLevel::Error, e.to_string());
                    }
                }
            }
            Command::Help => self.display.push_system(HELP_TEXT),
            Command::Quit => self.running = false,
            Command::Invalid(reason) => self.display.notify(NotifyLevel::Warning, reason),
        }
    }

    async fn attach(&mut self, path: &Path) {
        if let Err(e) = tokio::fs::metadata(path).await {
            self.display.notify(
                NotifyLevel::Error,
                format!("Cannot attach {}: {e}", path.display()),
            );
            return;
        }

        match Attachment::from_path(path).await {
            Ok(attachment) => {
                let name = attachment.name.clone();
                self.pending_attachments.push(attachment);
                self.display.notify(
                    NotifyLevel::Info,
                    format!(
                        "Attached {name} ({} pending)",
                        self.pending_attachments.len()
                    ),
                );
            }
            Err(e) => self.display.notify(NotifyLevel::Error, e.to_string()),
        }
    }

    fn reject_while_busy(&mut self) -> bool {
        let busy = self.pipeline.is_busy();
        if busy {
            self.display.notify(
                NotifyLevel::Info,
                "Wait for the current response to finish",
            );
        }
        busy
    }

    fn set_model(&mut self, model: String) {
        if !self.listing.is_empty() && !self.listing.models.contains(&model) {
            self.display.notify(
                NotifyLevel::Warning,
                format!("{model} is not in the installed list; trying anyway"),
            );
        } else {
            self.display
                .notify(NotifyLevel::Info, format!("Model: {model}"));
        }
        self.display.model.clone_from(&model);
        self.session.set_model(model);
    }

    fn cycle_model(&mut self) {
        match self.listing.next_after(self.session.model()).map(str::to_string) {
            Some(next) => self.set_model(next),
            None => self
                .display
                .notify(NotifyLevel::Info, "No models listed; use /model <name>"),
        }
    }

    /// Start a model query in the background
    fn refresh_models(&mut self) {
        if self.models_rx.is_some() {
            return;
        }
        let registry = ModelRegistry::new(self.pipeline.backend_handle());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(registry.list_models().await);
        });
        self.models_rx = Some(rx);
    }

    fn poll_models(&mut self) {
        let Some(rx) = self.models_rx.as_mut() else {
            return;
        };
        let listing = match rx.try_recv() {
            Ok(listing) => listing,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.models_rx = None;
                return;
            }
        };
        self.models_rx = None;

        if let Some(warning) = &listing.warning {
            self.display.notify(NotifyLevel::Warning, warning.clone());
        }
        self.display.models = listing.models.iter().cloned().collect();

        if self.session.model().is_empty() {
            if let Some(model) = listing.preferred(self.config.default_model.as_deref()) {
                self.display.model.clone_from(&model);
                self.session.set_model(model);
            }
        }
        self.listing = listing;
    }

    async fn refresh_saved(&mut self) {
        match self.history.list().await {
            Ok(names) => self.display.saved_conversations = names,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list saved conversations");
                self.display.notify(NotifyLevel::Warning, e.to_string());
            }
        }
    }

    fn page_size(&self) -> usize {
        usize::from(self.size.1.saturating_sub(INPUT_HEIGHT + 1) / 2).max(1)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the UI
    fn render(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [body, input, status] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let transcript = if body.width >= SIDEBAR_MIN_WIDTH {
            let [transcript, sidebar] =
                Layout::horizontal([Constraint::Min(40), Constraint::Length(SIDEBAR_WIDTH)])
                    .areas(body);
            self.draw_sidebar(frame, sidebar);
            transcript
        } else {
            body
        };

        let lines = self
            .display
            .transcript_lines(usize::from(transcript.width.saturating_sub(1)));
        frame.render_stateful_widget(TextBlock::new(&lines), transcript, &mut self.scroll);

        self.draw_input(frame, input);
        self.draw_status(frame, status);
    }

    fn draw_sidebar(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![Line::styled(
            "Conversations",
            Style::default().add_modifier(Modifier::BOLD),
        )];
        for name in &self.display.saved_conversations {
            let style = if *name == self.display.current_conversation {
                Style::default().fg(SELECTED)
            } else {
                Style::default().fg(DIM_GRAY)
            };
            lines.push(Line::styled(name.trim_end_matches(".json").to_string(), style));
        }

        lines.push(Line::default());
        lines.push(Line::styled(
            "Models",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for model in &self.display.models {
            let style = if *model == self.display.model {
                Style::default().fg(SELECTED)
            } else {
                Style::default().fg(DIM_GRAY)
            };
            lines.push(Line::styled(model.clone(), style));
        }

        let block = Block::default()
            .borders(Borders::LEFT)
            .border_style(Style::default().fg(DIM_GRAY));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_input(&self, frame: &mut Frame, area: Rect) {
        let title = match self.display.typing_phase {
            Some(phase) => format!(" {} ", TypingIndicator::frame(phase)),
            None if !self.pending_attachments.is_empty() => {
                let names: Vec<&str> = self
                    .pending_attachments
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect();
                format!(" attached: {} ", names.join(", "))
            }
            None => String::new(),
        };
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(DIM_GRAY))
            .title(Span::styled(title, Style::default().fg(theme::ASSISTANT_MAGENTA)));

        let text_width = usize::from(area.width.saturating_sub(1)).max(5);
        let text_height = usize::from(area.height.saturating_sub(1));

        // Keep the cursor line visible
        let full_input = format!("You: {}_", self.input_buffer);
        let wrapped = textwrap::wrap(&full_input, text_width);
        let skip = wrapped.len().saturating_sub(text_height);
        let style = if self.display.input_enabled {
            Style::default().fg(USER_GREEN)
        } else {
            Style::default().fg(DIM_GRAY)
        };
        let lines: Vec<Line> = wrapped
            .into_iter()
            .skip(skip)
            .map(|l| Line::styled(l.into_owned(), style))
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            self.display.status_text(),
            Style::default().fg(DIM_GRAY),
        )];

        if self.scroll.scroll_offset > 0 {
            spans.push(Span::styled(
                format!(" [^{} lines - PgDn]", self.scroll.scroll_offset),
                Style::default().fg(DIM_GRAY),
            ));
        }
        if let Some(notice) = &self.display.notification {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                notice.message.clone(),
                theme::notify_style(notice.level),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

/// File name shown for a conversation path
fn conversation_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether a saved conversation file is on disk
async fn conversation_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversation_name() {
        assert_eq!(
            conversation_name(Path::new("/data/history/chat_history.json")),
            "chat_history.json"
        );
        assert_eq!(conversation_name(Path::new("/")), "");
    }

    #[tokio::test]
    async fn test_load_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("chat_history.json");
        tokio::fs::write(&saved, "[]").await.unwrap();

        assert!(conversation_exists(&saved).await);
        assert!(!conversation_exists(&dir.path().join("typo.json")).await);
        assert!(!conversation_exists(dir.path()).await);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/tmp/a.png")), PathBuf::from("/tmp/a.png"));
        assert_eq!(expand_home(Path::new("notes.txt")), PathBuf::from("notes.txt"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/a.png")), home.join("a.png"));
        }
    }
}
