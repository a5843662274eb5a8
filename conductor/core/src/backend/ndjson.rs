//! Newline-Delimited JSON Decoding
//!
//! Ollama streams one JSON object per line. Network chunks do not respect
//! line boundaries (or UTF-8 character boundaries), so bytes are buffered
//! until a full line is available and only then decoded.

use serde::Deserialize;

use crate::error::ChatError;
use crate::messages::ContextToken;

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them (without `\n`)
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Take whatever unterminated line remains at end of stream
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            self.pending.clear();
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }
}

/// Message body of a streamed chunk
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkMessage {
    /// Text fragment
    #[serde(default)]
    pub content: String,
}

/// One line of a `/api/chat` stream
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatChunk {
    /// Assistant text, if this chunk carries any
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    /// Context token, if the server sent one
    #[serde(default)]
    pub context: Option<ContextToken>,
    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
    /// Error reported by the server mid-stream
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatChunk {
    /// The text fragment, when non-empty
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Parse one stream line
///
/// Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`ChatError::MalformedChunk`] for invalid UTF-8 or JSON.
pub fn parse_line(line: &[u8]) -> Result<Option<ChatChunk>, ChatError> {
    let text = std::str::from_utf8(line).map_err(|e| ChatError::MalformedChunk {
        line: String::from_utf8_lossy(line).into_owned(),
        reason: e.to_string(),
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ChatError::MalformedChunk {
            line: text.to_string(),
            reason: e.to_string(),
        })
}
