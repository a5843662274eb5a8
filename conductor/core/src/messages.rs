//! Conversation Records
//!
//! The data that flows between the pipeline, the store and any surface:
//! messages, their attachments, the server's opaque context token and the
//! identifiers used to correlate a request in logs.
//!
//! A [`Message`] is immutable once appended to a conversation. It serializes
//! to the history file format directly, so field names here are part of the
//! on-disk schema.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// File extensions treated as image attachments
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    /// The person at the keyboard ("You" in older history files)
    #[serde(alias = "You")]
    User,
    /// The model's reply
    Assistant,
}

impl Sender {
    /// Label used when rendering the sender
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

/// Kind of attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    /// Image sent inline to the model as base64
    Image,
    /// Document referenced by filesystem path
    Document,
}

/// A file attached to a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Image or document
    pub kind: AttachmentKind,
    /// Display name (file name)
    pub name: String,
    /// Base64 bytes for images, filesystem path for documents
    pub payload: String,
}

impl Attachment {
    /// Attach a file, choosing the kind from its extension
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if an image cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, ChatError> {
        if is_image_path(path) {
            Self::image(path).await
        } else {
            Ok(Self::document(path))
        }
    }

    /// Read an image and encode it for transport
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Io`] if the file cannot be read.
    pub async fn image(path: &Path) -> Result<Self, ChatError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChatError::io(path, e))?;
        Ok(Self {
            kind: AttachmentKind::Image,
            name: display_name(path),
            payload: BASE64.encode(bytes),
        })
    }

    /// Reference a document by path (read when the request is built)
    #[must_use]
    pub fn document(path: &Path) -> Self {
        Self {
            kind: AttachmentKind::Document,
            name: display_name(path),
            payload: path.to_string_lossy().into_owned(),
        }
    }

    /// Whether this attachment is an image
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

/// A single conversation entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent it
    pub sender: Sender,
    /// Message body (older history files call this `message`)
    #[serde(alias = "message")]
    pub text: String,
    /// Attached files, in the order the user added them
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// ISO-8601 creation time (UTC); empty for legacy records
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(sender: Sender, text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            sender,
            text: text.into(),
            attachments,
            timestamp: now_iso8601(),
        }
    }

    /// A message typed by the user
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self::new(Sender::User, text, attachments)
    }

    /// A finalized assistant response
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, Vec::new())
    }
}

/// Opaque continuation state returned by the server after each exchange
///
/// Never inspected; threaded into the next request unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextToken(serde_json::Value);

impl ContextToken {
    /// Wrap a raw server value
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The raw value as received
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Identifier for one submitted request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Generate a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a non-fatal notice shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Something degraded but the app keeps working
    Warning,
    /// An operation failed
    Error,
}

/// Whether a path looks like an image by extension
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
        .into_owned()
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_message_serializes_to_history_schema() {
        let msg = Message {
            sender: Sender::Assistant,
            text: "Hello".to_string(),
            attachments: vec![],
            timestamp: "2024-05-01T10:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sender": "Assistant",
                "text": "Hello",
                "attachments": [],
                "timestamp": "2024-05-01T10:00:00Z",
            })
        );
    }

    #[test]
    fn test_legacy_record_loads() {
        let msg: Message =
            serde_json::from_str(r#"{"sender": "You", "message": "hi there"}"#).unwrap();
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.text, "hi there");
        assert!(msg.attachments.is_empty());
        assert!(msg.timestamp.is_empty());
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let msg = Message::user("hey", vec![]);
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
    }

    #[test]
    fn test_image_detection() {
        assert!(is_image_path(Path::new("cat.PNG")));
        assert!(is_image_path(Path::new("/tmp/photo.jpeg")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("Makefile")));
    }

    #[tokio::test]
    async fn test_image_attachment_is_base64() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG").unwrap();

        let attachment = Attachment::from_path(file.path()).await.unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.payload, "iVBORw==");
        assert!(attachment.is_image());
    }

    #[tokio::test]
    async fn test_document_attachment_keeps_path() {
        let path = Path::new("/srv/docs/report.md");
        let attachment = Attachment::from_path(path).await.unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Document);
        assert_eq!(attachment.name, "report.md");
        assert_eq!(attachment.payload, "/srv/docs/report.md");
    }

    #[tokio::test]
    async fn test_missing_image_is_io_error() {
        let err = Attachment::image(Path::new("/nonexistent/pic.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Io { .. }));
    }

    #[test]
    fn test_context_token_is_opaque() {
        let token: ContextToken = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(token.as_value(), &serde_json::json!([1, 2, 3]));
        assert_eq!(serde_json::to_string(&token).unwrap(), "[1,2,3]");
    }
}
