use std::sync::Arc;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::retry::RetryPolicy;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::settings::LlmSettings;
use crate::core::errors::ApiError;

/// Single-shot text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;
}

/// `Generator` that sends the prompt as one user message to a chat model.
pub struct ProviderGenerator {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
    temperature: Option<f64>,
    retry: RetryPolicy,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            temperature: None,
            retry,
        }
    }

    pub fn from_settings(provider: Arc<dyn LlmProvider>, settings: &LlmSettings) -> Self {
        Self {
            temperature: settings.temperature,
            ..Self::new(
                provider,
                settings.chat_model.clone(),
                RetryPolicy::from_settings(settings),
            )
        }
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        self.retry
            .run("generate", || {
                let mut request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
                request.temperature = self.temperature;
                self.provider.chat(request, &self.model_id)
            })
            .await
    }
}
