//! Ollama Backend Implementation
//!
//! Chat backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! Ollama provides a REST API for:
//! - `/api/chat` - Chat completions, streamed as newline-delimited JSON
//! - `/api/generate` - Single-shot completions
//! - `/api/tags` - List available models
//!
//! Streaming exchanges run on a spawned task; tokens travel back to the
//! interface task over an mpsc channel.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ndjson::{parse_line, LineDecoder};
use super::traits::{
    BackendConfig, ChatBackend, ChatRequest, ChatTurn, GenerateRequest, GenerateResponse,
    ModelInfo, StreamingToken,
};
use crate::error::ChatError;
use crate::messages::ContextToken;

/// Capacity of the token channel between worker and interface task
const TOKEN_CHANNEL_CAPACITY: usize = 256;

/// Body of a `/api/chat` request
#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    context: Option<&'a ContextToken>,
}

/// Body of a `/api/generate` request
#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    context: Option<&'a ContextToken>,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
    #[serde(default)]
    context: Option<ContextToken>,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

/// Ollama backend client
#[derive(Clone)]
pub struct OllamaBackend {
    /// Server base URL, without trailing slash
    base_url: String,
    /// HTTP client (no overall timeout: streams can run long)
    http_client: reqwest::Client,
    /// Timeout for non-streaming requests
    request_timeout: Duration,
}

impl OllamaBackend {
    /// Default connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default timeout for `/api/generate` and `/api/tags`
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Create a backend for a base URL such as `http://localhost:11434`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NetworkUnavailable`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            request_timeout,
        })
    }

    /// Create from `BackendConfig` with default timeouts
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NetworkUnavailable`] if the HTTP client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ChatError> {
        Self::new(
            config.base_url(),
            Self::DEFAULT_CONNECT_TIMEOUT,
            Self::DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// Run one streaming exchange, forwarding tokens to `tx`
    ///
    /// Returns `Ok(())` once `Done` has been delivered or the receiver went
    /// away; any error is left for the caller to forward.
    async fn pump(
        client: reqwest::Client,
        url: String,
        request: ChatRequest,
        tx: &mpsc::Sender<StreamingToken>,
    ) -> Result<(), ChatError> {
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            context: request.context.as_ref(),
        };

        let response = client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::NetworkUnavailable(format!(
                "Ollama returned {status}: {}",
                text.trim()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = LineDecoder::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            for line in decoder.push(&bytes) {
                if Self::forward_line(&line, tx).await? {
                    return Ok(());
                }
            }
        }

        // Connection closed: a trailing unterminated line still counts
        if let Some(line) = decoder.finish() {
            if Self::forward_line(&line, tx).await? {
                return Ok(());
            }
        }

        let _ = tx.send(StreamingToken::Done).await;
        Ok(())
    }

    /// Forward the tokens of one line; `Ok(true)` means the stream is over
    async fn forward_line(
        line: &[u8],
        tx: &mpsc::Sender<StreamingToken>,
    ) -> Result<bool, ChatError> {
        let Some(chunk) = parse_line(line)? else {
            return Ok(false);
        };

        if let Some(error) = chunk.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(ChatError::ServerError(error.to_string()));
        }

        if let Some(fragment) = chunk.fragment() {
            if tx
                .send(StreamingToken::Fragment(fragment.to_string()))
                .await
                .is_err()
            {
                // Receiver dropped, stop streaming
                return Ok(true);
            }
        }

        if let Some(context) = chunk.context {
            if tx.send(StreamingToken::Context(context)).await.is_err() {
                return Ok(true);
            }
        }

        if chunk.done {
            let _ = tx.send(StreamingToken::Done).await;
            return Ok(true);
        }

        Ok(false)
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn stream_chat(&self, request: ChatRequest) -> mpsc::Receiver<StreamingToken> {
        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        let client = self.http_client.clone();
        let url = self.chat_url();

        tokio::spawn(async move {
            let model = request.model.clone();
            tracing::debug!(model = %model, url = %url, "Starting chat stream");

            if let Err(e) = Self::pump(client, url, request, &tx).await {
                tracing::warn!(model = %model, kind = e.kind(), error = %e, "Chat stream failed");
                let _ = tx.send(StreamingToken::Error(e)).await;
            }
        });

        rx
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
        let start = Instant::now();
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            context: request.context.as_ref(),
        };

        let response = self
            .http_client
            .post(self.generate_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::NetworkUnavailable(format!(
                "Ollama returned {status}: {}",
                text.trim()
            )));
        }

        let bytes = response.bytes().await?;
        let reply: GenerateReply =
            serde_json::from_slice(&bytes).map_err(|e| ChatError::MalformedChunk {
                line: String::from_utf8_lossy(&bytes).into_owned(),
                reason: e.to_string(),
            })?;

        Ok(GenerateResponse {
            content: reply.response,
            context: reply.context,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let response = self
            .http_client
            .get(self.tags_url())
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::NetworkUnavailable(format!(
                "Ollama returned {status}: {}",
                body.trim()
            )));
        }

        let reply: TagsReply = response.json().await?;

        Ok(reply
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size: m.size,
                parameters: m.details.and_then(|d| d.parameter_size),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatRole;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::from_config(&BackendConfig::default()).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(backend.tags_url(), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_chat_body_shape() {
        let turns = vec![ChatTurn::new(ChatRole::User, "Hello")];
        let body = ChatBody {
            model: "llama3.2",
            messages: &turns,
            stream: true,
            context: None,
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "llama3.2",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true,
                "context": null,
            })
        );
    }

    #[test]
    fn test_generate_body_threads_context() {
        let context = ContextToken::new(serde_json::json!([4, 5]));
        let body = GenerateBody {
            model: "m",
            prompt: "p",
            stream: false,
            context: Some(&context),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["context"], serde_json::json!([4, 5]));
        assert_eq!(json["stream"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn test_forward_line_stops_on_done() {
        let (tx, mut rx) = mpsc::channel(8);
        let finished = OllamaBackend::forward_line(
            br#"{"message":{"content":"bye"},"context":[9],"done":true}"#,
            &tx,
        )
        .await
        .unwrap();
        assert!(finished);

        assert!(matches!(rx.recv().await, Some(StreamingToken::Fragment(f)) if f == "bye"));
        assert!(matches!(rx.recv().await, Some(StreamingToken::Context(_))));
        assert!(matches!(rx.recv().await, Some(StreamingToken::Done)));
    }

    #[tokio::test]
    async fn test_forward_line_empty_error_field_keeps_fragment() {
        let (tx, mut rx) = mpsc::channel(8);
        let finished = OllamaBackend::forward_line(
            br#"{"error":"","message":{"content":"still here"},"done":false}"#,
            &tx,
        )
        .await
        .unwrap();
        assert!(!finished);
        drop(tx);

        assert!(matches!(rx.recv().await, Some(StreamingToken::Fragment(f)) if f == "still here"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_forward_line_surfaces_server_error() {
        let (tx, _rx) = mpsc::channel(8);
        let err = OllamaBackend::forward_line(br#"{"error":"model 'x' not found"}"#, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ServerError(msg) if msg.contains("not found")));
    }
}
