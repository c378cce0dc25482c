//! One search round: collect, reset the scratch collection, ingest, answer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::chunker::TextSplitter;
use super::collection::ScratchCollectionManager;
use super::collector::{SearchResult, SearchResultCollector};
use super::ingest::DocumentIngestor;
use super::notify::Notifier;
use super::store::Document;
use super::synthesizer::AnswerSynthesizer;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub answer: String,
    pub results: Vec<SearchResult>,
}

pub struct SearchPipeline {
    collector: SearchResultCollector,
    manager: ScratchCollectionManager,
    ingestor: DocumentIngestor,
    synthesizer: AnswerSynthesizer,
    splitter: Arc<dyn TextSplitter>,
    collection: String,
    max_results: usize,
    // clear + ingest + query share one collection; rounds must not interleave
    round_lock: Mutex<()>,
}

impl SearchPipeline {
    pub fn new(
        collector: SearchResultCollector,
        manager: ScratchCollectionManager,
        ingestor: DocumentIngestor,
        synthesizer: AnswerSynthesizer,
        splitter: Arc<dyn TextSplitter>,
        collection: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            collector,
            manager,
            ingestor,
            synthesizer,
            splitter,
            collection: collection.into(),
            max_results,
            round_lock: Mutex::new(()),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Runs a full round. On failure the error is also sent to `notifier`
    /// and no partial answer is returned.
    pub async fn run(&self, query: &str, notifier: &dyn Notifier) -> Result<RoundOutcome, ApiError> {
        let _guard = self.round_lock.lock().await;

        match self.run_locked(query, notifier).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!("Search round for '{}' failed: {}", query, err);
                notifier.notify_error(&format!("Web search failed: {}", err));
                Err(err)
            }
        }
    }

    async fn run_locked(&self, query: &str, notifier: &dyn Notifier) -> Result<RoundOutcome, ApiError> {
        notifier.notify("Searching the web...");
        let results = self.collector.collect(query, self.max_results).await?;
        tracing::info!("Collected {} usable results for '{}'", results.len(), query);

        self.manager.ensure(&self.collection).await?;
        self.manager.clear(&self.collection).await?;

        for result in &results {
            let documents: Vec<Document> = self
                .splitter
                .split(&result.content, None)
                .into_iter()
                .map(|chunk| Document::new(chunk.text))
                .collect();

            self.ingestor
                .ingest(
                    &self.collection,
                    documents,
                    &result.url,
                    &result.search_metadata(),
                    Some(notifier),
                )
                .await?;
        }

        let answer = self.synthesizer.synthesize(query, &results).await?;
        Ok(RoundOutcome { answer, results })
    }
}
