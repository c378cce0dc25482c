//! Stores chunked documents in a named collection.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;

use super::collection::VectorMemory;
use super::notify::Notifier;
use super::store::{Document, Metadata, PointId};
use crate::core::config::settings::IngestSettings;
use crate::core::errors::ApiError;
use crate::llm::Embedder;

pub type BeforeStoreHook = Arc<dyn Fn(Vec<Document>) -> Vec<Document> + Send + Sync>;
pub type BeforeInsertHook = Arc<dyn Fn(Document) -> Document + Send + Sync>;
pub type AfterStoredHook = Arc<dyn Fn(&str, &[PointId]) + Send + Sync>;

/// Caller-registered transforms, applied in registration order.
#[derive(Clone, Default)]
pub struct IngestHooks {
    before_store: Vec<BeforeStoreHook>,
    before_insert: Vec<BeforeInsertHook>,
    after_stored: Vec<AfterStoredHook>,
}

impl IngestHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once over the whole batch before anything is stored.
    pub fn before_store(
        mut self,
        hook: impl Fn(Vec<Document>) -> Vec<Document> + Send + Sync + 'static,
    ) -> Self {
        self.before_store.push(Arc::new(hook));
        self
    }

    /// Runs per document, after provenance metadata is attached.
    pub fn before_insert(mut self, hook: impl Fn(Document) -> Document + Send + Sync + 'static) -> Self {
        self.before_insert.push(Arc::new(hook));
        self
    }

    pub fn after_stored(mut self, hook: impl Fn(&str, &[PointId]) + Send + Sync + 'static) -> Self {
        self.after_stored.push(Arc::new(hook));
        self
    }
}

pub struct DocumentIngestor {
    memory: Arc<VectorMemory>,
    embedder: Arc<dyn Embedder>,
    hooks: IngestHooks,
    notify_interval: Duration,
    insert_delay: Duration,
}

impl DocumentIngestor {
    pub fn new(memory: Arc<VectorMemory>, embedder: Arc<dyn Embedder>, settings: &IngestSettings) -> Self {
        Self {
            memory,
            embedder,
            hooks: IngestHooks::default(),
            notify_interval: settings.notify_interval,
            insert_delay: settings.insert_delay,
        }
    }

    pub fn with_hooks(mut self, hooks: IngestHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Embeds and stores `documents` in `collection_name`, returning the ids
    /// of the stored points. Each point's metadata gets `source` and `when`,
    /// then `metadata` on top. Documents whose text is empty after the
    /// `before_insert` hooks are skipped.
    ///
    /// A missing collection aborts before anything is stored and is
    /// reported as `ApiError::Configuration`.
    pub async fn ingest(
        &self,
        collection_name: &str,
        documents: Vec<Document>,
        source: &str,
        metadata: &Metadata,
        notifier: Option<&dyn Notifier>,
    ) -> Result<Vec<PointId>, ApiError> {
        let collection = self.memory.get(collection_name).await.map_err(|_| {
            tracing::error!("Collection '{}' does not exist", collection_name);
            ApiError::Configuration(format!(
                "vector collection '{}' does not exist",
                collection_name
            ))
        })?;

        let documents = self
            .hooks
            .before_store
            .iter()
            .fold(documents, |docs, hook| hook(docs));
        let total = documents.len();
        tracing::info!("Preparing to memorize {} vectors", total);

        let mut stored = Vec::with_capacity(total);
        let mut last_notification = Instant::now();

        for (index, mut doc) in documents.into_iter().enumerate() {
            if let Some(notifier) = notifier {
                if last_notification.elapsed() >= self.notify_interval {
                    let percent = index * 100 / total;
                    notifier.notify(&format!("Read {}% of {}", percent, source));
                    last_notification = Instant::now();
                }
            }

            doc.metadata
                .insert("source".to_string(), Value::String(source.to_string()));
            doc.metadata.insert("when".to_string(), json!(timestamp()));
            doc.metadata
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

            let doc = self
                .hooks
                .before_insert
                .iter()
                .fold(doc, |doc, hook| hook(doc));

            if doc.text.is_empty() {
                tracing::debug!("Skipped empty chunk {}/{} of {}", index + 1, total, source);
                continue;
            }

            let embedding = self
                .embedder
                .embed_documents(std::slice::from_ref(&doc.text))
                .await?
                .pop()
                .ok_or_else(|| ApiError::Internal("embedder returned no vectors".to_string()))?;
            let id = collection
                .add_point(&doc.text, embedding, doc.metadata)
                .await?;
            tracing::debug!("Inserted chunk {}/{} of {} as {}", index + 1, total, source, id);
            stored.push(id);

            if !self.insert_delay.is_zero() {
                tokio::time::sleep(self.insert_delay).await;
            }
        }

        for hook in &self.hooks.after_stored {
            hook(source, &stored);
        }

        if let Some(notifier) = notifier {
            notifier.notify(&format!(
                "Finished reading {}, stored {} of {} chunks",
                source,
                stored.len(),
                total
            ));
        }

        Ok(stored)
    }
}

/// Seconds since the epoch, with millisecond precision.
fn timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
