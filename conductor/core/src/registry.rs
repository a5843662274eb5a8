//! Model Registry Client
//!
//! Asks the server which models are installed. Failure is never fatal: the
//! listing comes back empty with a warning and the user can still type a
//! model name by hand.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::backend::ChatBackend;

/// Result of a model query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelListing {
    /// Installed model identifiers
    pub models: BTreeSet<String>,
    /// Why the listing is empty, when the query failed
    pub warning: Option<String>,
}

impl ModelListing {
    /// The configured model if set, otherwise the first listed one
    #[must_use]
    pub fn preferred(&self, configured: Option<&str>) -> Option<String> {
        configured
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.models.iter().next().cloned())
    }

    /// The model after `current` in listing order, wrapping around
    #[must_use]
    pub fn next_after(&self, current: &str) -> Option<&str> {
        let mut after = self
            .models
            .range::<str, _>((std::ops::Bound::Excluded(current), std::ops::Bound::Unbounded));
        after
            .next()
            .or_else(|| self.models.iter().next())
            .map(String::as_str)
    }

    /// Whether the server listed no models
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Queries installed models through a backend
pub struct ModelRegistry<B: ChatBackend> {
    backend: Arc<B>,
}

impl<B: ChatBackend> ModelRegistry<B> {
    /// Create a registry sharing a backend handle
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Query the server
    pub async fn list_models(&self) -> ModelListing {
        match self.backend.list_models().await {
            Ok(infos) => {
                let models: BTreeSet<String> = infos.into_iter().map(|m| m.name).collect();
                tracing::info!(count = models.len(), backend = self.backend.name(), "Models listed");
                let warning = models
                    .is_empty()
                    .then(|| "The server reports no installed models".to_string());
                ModelListing { models, warning }
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Model listing failed");
                ModelListing {
                    models: BTreeSet::new(),
                    warning: Some(format!("Could not list models: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        ChatRequest, GenerateRequest, GenerateResponse, ModelInfo, StreamingToken,
    };
    use crate::error::ChatError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    struct FixedModels(Result<Vec<&'static str>, ()>);

    #[async_trait]
    impl ChatBackend for FixedModels {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn stream_chat(&self, _: ChatRequest) -> mpsc::Receiver<StreamingToken> {
            mpsc::channel(1).1
        }

        async fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
            Err(ChatError::ServerError("unused".into()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
            match &self.0 {
                Ok(names) => Ok(names
                    .iter()
                    .map(|n| ModelInfo {
                        name: (*n).to_string(),
                        size: None,
                        parameters: None,
                    })
                    .collect()),
                Err(()) => Err(ChatError::NetworkUnavailable("connection refused".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_listing_is_sorted_set() {
        let registry = ModelRegistry::new(Arc::new(FixedModels(Ok(vec![
            "mistral", "llama3.2", "mistral",
        ]))));
        let listing = registry.list_models().await;

        assert_eq!(
            listing.models.iter().collect::<Vec<_>>(),
            vec!["llama3.2", "mistral"]
        );
        assert_eq!(listing.warning, None);
        assert_eq!(listing.preferred(None).as_deref(), Some("llama3.2"));
        assert_eq!(listing.preferred(Some("qwen2")).as_deref(), Some("qwen2"));
    }

    #[tokio::test]
    async fn test_failure_is_empty_with_warning() {
        let registry = ModelRegistry::new(Arc::new(FixedModels(Err(()))));
        let listing = registry.list_models().await;

        assert!(listing.is_empty());
        assert!(listing.warning.unwrap().contains("connection refused"));
    }

    #[test]
    fn test_next_after_wraps() {
        let listing = ModelListing {
            models: ["a", "b", "c"].iter().map(|s| (*s).to_string()).collect(),
            warning: None,
        };
        assert_eq!(listing.next_after("a"), Some("b"));
        assert_eq!(listing.next_after("c"), Some("a"));
        assert_eq!(listing.next_after("unknown-model"), Some("a"));
        assert_eq!(ModelListing::default().next_after("a"), None);
    }
}
