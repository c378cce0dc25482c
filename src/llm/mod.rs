pub mod embedder;
pub mod generator;
pub mod openai_compat;
pub mod provider;
pub mod retry;
pub mod types;

pub use embedder::{Embedder, EmbedderInfo, ProviderEmbedder};
pub use generator::{Generator, ProviderGenerator};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::LlmProvider;
pub use retry::RetryPolicy;
