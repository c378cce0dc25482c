use std::sync::Arc;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::retry::RetryPolicy;
use crate::core::errors::ApiError;

/// Text used to measure an embedder's output dimensionality.
const PROBE_TEXT: &str = "hello world";
const FALLBACK_EMBEDDER_NAME: &str = "default_embedder";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, when the backend exposes one.
    fn model_name(&self) -> Option<&str>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn dimension(&self) -> Result<usize, ApiError> {
        Ok(self.embed_query(PROBE_TEXT).await?.len())
    }
}

/// Name and dimensionality of the active embedder, used to size and alias
/// vector collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub name: String,
    pub dimension: usize,
}

impl EmbedderInfo {
    pub async fn probe(embedder: &dyn Embedder) -> Result<Self, ApiError> {
        let dimension = embedder.dimension().await?;
        if dimension == 0 {
            return Err(ApiError::Configuration(
                "embedder returned an empty vector".to_string(),
            ));
        }
        let name = embedder
            .model_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_EMBEDDER_NAME)
            .to_string();
        Ok(Self { name, dimension })
    }
}

/// `Embedder` backed by an `LlmProvider` embedding endpoint.
pub struct ProviderEmbedder {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
    retry: RetryPolicy,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            retry,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model_name(&self) -> Option<&str> {
        Some(&self.model_id)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Internal("embedder returned no vectors".to_string()))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        self.retry
            .run("embed", || self.provider.embed(texts, &self.model_id))
            .await
    }
}
