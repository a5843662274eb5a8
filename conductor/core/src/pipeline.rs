//! Streaming Response Pipeline
//!
//! Turns one user submission into one assistant message. The network
//! exchange runs on a backend worker task; this side only drains the token
//! channel, so the interface task never waits on the server.
//!
//! # Lifecycle
//!
//! ```text
//! submit ──► Streaming ──(Done / channel closed)──► finalize ──► Idle
//!                │
//!                └──────────(Error)───────────────► fail ──────► Idle
//! ```
//!
//! Every submitted request ends in exactly one of `on_finalized` or
//! `on_error`, the typing indicator is stopped before either, and input is
//! re-enabled afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::backend::{ChatBackend, ChatRequest, ChatRole, ChatTurn, StreamingToken};
use crate::error::ChatError;
use crate::messages::{Attachment, AttachmentKind, Message, NotifyLevel, RequestId};
use crate::session::ChatSession;
use crate::surface::Surface;
use crate::typing::TypingIndicator;

/// Literal markers stripped from finished responses
pub const REASONING_CLOSE_MARKERS: &[&str] = &["</think>"];

/// Post-process a finished response
///
/// Removes reasoning-closure markers and collapses every whitespace run to
/// a single space, trimming both ends.
#[must_use]
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.to_string();
    for marker in REASONING_CLOSE_MARKERS {
        text = text.replace(marker, "");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How an exchange ended
#[derive(Debug)]
pub enum Outcome {
    /// The response completed; this is the stored assistant message
    Finalized(Message),
    /// The exchange failed
    Failed(ChatError),
}

/// Returned by a successful submit
#[derive(Clone, Debug)]
pub struct RequestHandle {
    /// Correlates log lines for this request
    pub id: RequestId,
    /// The user message as recorded
    pub user_message: Message,
}

/// Accumulation state of the in-flight response
#[derive(Debug)]
pub struct StreamingState {
    id: RequestId,
    fragments: Vec<String>,
    rx: mpsc::Receiver<StreamingToken>,
    started: Instant,
}

impl StreamingState {
    /// Request this state belongs to
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Fragments received so far
    #[must_use]
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Concatenation of all fragments
    #[must_use]
    pub fn partial_text(&self) -> String {
        self.fragments.concat()
    }
}

/// The streaming pipeline
///
/// Holds at most one in-flight exchange.
pub struct StreamingPipeline<B: ChatBackend> {
    backend: Arc<B>,
    typing: TypingIndicator,
    active: Option<StreamingState>,
}

impl<B: ChatBackend> StreamingPipeline<B> {
    /// Create a pipeline over a backend
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            typing: TypingIndicator::default(),
            active: None,
        }
    }

    /// Use a different typing animation interval
    #[must_use]
    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing = TypingIndicator::new(interval);
        self
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared handle to the backend, for work outside the pipeline
    #[must_use]
    pub fn backend_handle(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// The in-flight exchange, if any
    #[must_use]
    pub fn active(&self) -> Option<&StreamingState> {
        self.active.as_ref()
    }

    /// The typing indicator
    #[must_use]
    pub fn typing(&self) -> &TypingIndicator {
        &self.typing
    }

    /// Submit user input
    ///
    /// Blank input returns `Ok(None)` and changes nothing. Otherwise the
    /// user message is recorded, the request is handed to the backend and
    /// this returns without waiting for the server.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RequestInFlight`] while another request is active.
    pub async fn submit<S: Surface + ?Sized>(
        &mut self,
        session: &mut ChatSession,
        text: &str,
        attachments: Vec<Attachment>,
        surface: &mut S,
        now: Instant,
    ) -> Result<Option<RequestHandle>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if let Some(active) = &self.active {
            tracing::warn!(active = %active.id, "Submit rejected: request in flight");
            return Err(ChatError::RequestInFlight);
        }

        let id = RequestId::new();
        let user_message = Message::user(text, attachments);
        let request = build_request(session, &user_message, surface).await;

        if let Err(e) = session.record(user_message.clone()).await {
            surface.on_notify(NotifyLevel::Warning, &format!("Could not save history: {e}"));
        }

        surface.set_input_enabled(false);
        self.typing.start(now);
        surface.on_typing_tick(0);

        tracing::info!(
            request_id = %id,
            model = %request.model,
            backend = self.backend.name(),
            attachments = user_message.attachments.len(),
            "Request submitted"
        );

        let rx = self.backend.stream_chat(request);
        self.active = Some(StreamingState {
            id,
            fragments: Vec::new(),
            rx,
            started: now,
        });

        Ok(Some(RequestHandle { id, user_message }))
    }

    /// Advance the typing animation and drain queued tokens without waiting
    ///
    /// Call once per frame. Returns the outcome when the exchange ends.
    pub async fn poll<S: Surface + ?Sized>(
        &mut self,
        session: &mut ChatSession,
        surface: &mut S,
        now: Instant,
    ) -> Option<Outcome> {
        let state = self.active.as_mut()?;

        if let Some(phase) = self.typing.tick(now) {
            surface.on_typing_tick(phase);
        }

        let result = loop {
            let token = match state.rx.try_recv() {
                Ok(token) => token,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => StreamingToken::Done,
            };
            if let Some(result) = apply_token(state, token, session, surface) {
                break result;
            }
        };

        Some(self.finish(result, session, surface).await)
    }

    /// Wait for the in-flight exchange to end
    ///
    /// For headless callers; `None` when nothing is in flight.
    pub async fn run_to_completion<S: Surface + ?Sized>(
        &mut self,
        session: &mut ChatSession,
        surface: &mut S,
    ) -> Option<Outcome> {
        let state = self.active.as_mut()?;

        let result = loop {
            let token = state.rx.recv().await.unwrap_or(StreamingToken::Done);
            if let Some(result) = apply_token(state, token, session, surface) {
                break result;
            }
        };

        Some(self.finish(result, session, surface).await)
    }

    async fn finish<S: Surface + ?Sized>(
        &mut self,
        result: Result<(), ChatError>,
        session: &mut ChatSession,
        surface: &mut S,
    ) -> Outcome {
        let state = self.active.take();
        let (id, fragments, elapsed) = state.map_or_else(
            || (RequestId::new(), Vec::new(), Duration::ZERO),
            |s| (s.id, s.fragments, s.started.elapsed()),
        );

        self.typing.stop();
        surface.on_typing_stop();

        let outcome = match result {
            Ok(()) => {
                let message = Message::assistant(clean_response(&fragments.concat()));
                surface.on_finalized(&message);
                tracing::info!(
                    request_id = %id,
                    fragments = fragments.len(),
                    chars = message.text.len(),
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "Response finalized"
                );

                if let Err(e) = session.record(message.clone()).await {
                    surface.on_notify(NotifyLevel::Warning, &format!("Could not save history: {e}"));
                }
                Outcome::Finalized(message)
            }
            Err(e) => {
                tracing::warn!(request_id = %id, kind = e.kind(), error = %e, "Response failed");
                surface.on_error(&e);
                Outcome::Failed(e)
            }
        };

        surface.set_input_enabled(true);
        outcome
    }
}

/// Apply one token; `Some` once the exchange is over
fn apply_token<S: Surface + ?Sized>(
    state: &mut StreamingState,
    token: StreamingToken,
    session: &mut ChatSession,
    surface: &mut S,
) -> Option<Result<(), ChatError>> {
    match token {
        StreamingToken::Fragment(text) => {
            state.fragments.push(text);
            surface.on_partial_update(&state.partial_text());
            None
        }
        StreamingToken::Context(context) => {
            session.set_context(Some(context));
            None
        }
        StreamingToken::Done => Some(Ok(())),
        StreamingToken::Error(e) => Some(Err(e)),
    }
}

/// Build the wire request for a user message
async fn build_request<S: Surface + ?Sized>(
    session: &ChatSession,
    message: &Message,
    surface: &mut S,
) -> ChatRequest {
    let mut request =
        ChatRequest::new(session.model()).with_context(session.context().cloned());

    if let Some(system) = session.system_prompt() {
        request = request.with_turn(ChatTurn::new(ChatRole::System, system));
    }

    let mut content = message.text.clone();
    let mut images = Vec::new();

    for attachment in &message.attachments {
        match attachment.kind {
            AttachmentKind::Image => images.push(attachment.payload.clone()),
            AttachmentKind::Document => {
                content.push_str("\n\n[Attached document: ");
                content.push_str(&attachment.name);
                content.push(']');

                match tokio::fs::read_to_string(&attachment.payload).await {
                    Ok(body) => {
                        content.push('\n');
                        content.push_str(&body);
                    }
                    Err(e) => {
                        tracing::warn!(path = %attachment.payload, error = %e, "Document unreadable");
                        surface.on_notify(
                            NotifyLevel::Warning,
                            &format!("Could not read {}: {e}", attachment.name),
                        );
                    }
                }
            }
        }
    }

    request.with_turn(ChatTurn::new(ChatRole::User, content).with_images(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ContextToken;
    use crate::store::ConversationStore;
    use crate::surface::{EventLog, SurfaceEvent};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    use crate::backend::{GenerateRequest, GenerateResponse, ModelInfo};

    /// Replays a fixed token script and remembers the last request
    struct ScriptedBackend {
        script: Mutex<Vec<StreamingToken>>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<StreamingToken>) -> Self {
            Self {
                script: Mutex::new(script),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn stream_chat(&self, request: ChatRequest) -> mpsc::Receiver<StreamingToken> {
            *self.last_request.lock().unwrap() = Some(request);
            let tokens = std::mem::take(&mut *self.script.lock().unwrap());
            let (tx, rx) = mpsc::channel(tokens.len().max(1));
            for token in tokens {
                tx.try_send(token).unwrap();
            }
            rx
        }

        async fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
            Err(ChatError::ServerError("unused".into()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
            Ok(Vec::new())
        }
    }

    fn fragments(parts: &[&str]) -> Vec<StreamingToken> {
        let mut tokens: Vec<_> = parts
            .iter()
            .map(|p| StreamingToken::Fragment((*p).to_string()))
            .collect();
        tokens.push(StreamingToken::Done);
        tokens
    }

    fn session(dir: &tempfile::TempDir) -> ChatSession {
        ChatSession::new("llama3.2", ConversationStore::new(dir.path().join("chat.json")))
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("Hello world</think>  "), "Hello world");
        assert_eq!(clean_response("  a\n\n b\t c "), "a b c");
        assert_eq!(clean_response("x</think>y"), "xy");
        assert_eq!(clean_response("<think>kept"), "<think>kept");
        assert_eq!(clean_response(""), "");
    }

    #[tokio::test]
    async fn test_fragments_become_one_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut pipeline =
            StreamingPipeline::new(ScriptedBackend::new(fragments(&["Hel", "lo", " wor", "ld</think>  "])));
        let mut log = EventLog::new();
        let now = Instant::now();

        pipeline
            .submit(&mut session, "hi", vec![], &mut log, now)
            .await
            .unwrap()
            .unwrap();
        let outcome = pipeline.poll(&mut session, &mut log, now).await;

        match outcome {
            Some(Outcome::Finalized(message)) => assert_eq!(message.text, "Hello world"),
            other => panic!("expected Finalized, got {other:?}"),
        }

        let partials: Vec<_> = log
            .events()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::PartialUpdate(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(partials, vec!["Hel", "Hello", "Hello wor", "Hello world</think>  "]);
        assert_eq!(log.terminal_count(), 1);
        assert_eq!(session.messages().len(), 2);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_blank_input_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut pipeline = StreamingPipeline::new(ScriptedBackend::new(vec![]));
        let mut log = EventLog::new();

        let handle = pipeline
            .submit(&mut session, "  \n ", vec![], &mut log, Instant::now())
            .await
            .unwrap();

        assert!(handle.is_none());
        assert!(log.events().is_empty());
        assert!(session.messages().is_empty());
        assert!(pipeline.backend().last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_and_system_prompt_are_sent() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir).with_system_prompt(Some("Be brief".into()));
        session.set_context(Some(ContextToken::new(serde_json::json!([1, 2]))));
        let mut pipeline = StreamingPipeline::new(ScriptedBackend::new(fragments(&["ok"])));
        let mut log = EventLog::new();

        pipeline
            .submit(&mut session, "hi", vec![], &mut log, Instant::now())
            .await
            .unwrap();

        let request = pipeline.backend().last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "llama3.2");
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[1].content, "hi");
        assert_eq!(
            request.context.as_ref().map(ContextToken::as_value),
            Some(&serde_json::json!([1, 2]))
        );
    }

    #[tokio::test]
    async fn test_attachments_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes.txt");
        tokio::fs::write(&doc, "line one").await.unwrap();

        let mut session = session(&dir);
        let mut pipeline = StreamingPipeline::new(ScriptedBackend::new(fragments(&["ok"])));
        let mut log = EventLog::new();
        let image = Attachment {
            kind: AttachmentKind::Image,
            name: "cat.png".into(),
            payload: "iVBORw==".into(),
        };
        let missing = Attachment::document(&dir.path().join("gone.md"));

        pipeline
            .submit(
                &mut session,
                "look",
                vec![image, Attachment::document(&doc), missing],
                &mut log,
                Instant::now(),
            )
            .await
            .unwrap();

        let request = pipeline.backend().last_request.lock().unwrap().clone().unwrap();
        let turn = &request.messages[0];
        assert_eq!(turn.images, vec!["iVBORw==".to_string()]);
        assert_eq!(
            turn.content,
            "look\n\n[Attached document: notes.txt]\nline one\n\n[Attached document: gone.md]"
        );
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, SurfaceEvent::Notify(NotifyLevel::Warning, _))));
    }

    #[tokio::test]
    async fn test_typing_ticks_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        // No Done yet: the exchange stays open while the sender lives
        let (tx, rx) = mpsc::channel(4);
        let mut pipeline = StreamingPipeline::new(ScriptedBackend::new(vec![]))
            .with_typing_interval(Duration::from_millis(500));
        let mut log = EventLog::new();
        let t0 = Instant::now();

        pipeline
            .submit(&mut session, "hi", vec![], &mut log, t0)
            .await
            .unwrap();
        // Swap in a channel the test controls
        if let Some(state) = pipeline.active.as_mut() {
            state.rx = rx;
        }

        assert!(pipeline.poll(&mut session, &mut log, t0 + Duration::from_millis(600)).await.is_none());
        tx.send(StreamingToken::Done).await.unwrap();
        assert!(pipeline.poll(&mut session, &mut log, t0 + Duration::from_millis(700)).await.is_some());

        let events = log.take();
        assert_eq!(
            events[..3],
            [
                SurfaceEvent::InputEnabled(false),
                SurfaceEvent::TypingTick(0),
                SurfaceEvent::TypingTick(1),
            ]
        );
        let stop = events.iter().position(|e| *e == SurfaceEvent::TypingStop).unwrap();
        assert!(matches!(events[stop + 1], SurfaceEvent::Finalized(_)));
        assert_eq!(events.last(), Some(&SurfaceEvent::InputEnabled(true)));
        assert!(!pipeline.typing().is_active());
    }
}
