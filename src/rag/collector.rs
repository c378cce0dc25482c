use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::store::Metadata;
use crate::core::errors::ApiError;
use crate::tools::fetch::ContentFetcher;
use crate::tools::search::SearchProvider;

/// A search hit whose content could be fetched. `position` is the 1-based
/// rank among the usable results of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub position: usize,
}

impl SearchResult {
    /// Metadata attached to every chunk stored from this result.
    pub fn search_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "search".to_string(),
            json!({
                "title": self.title,
                "link": self.url,
                "description": self.description,
            }),
        );
        metadata
    }
}

pub struct SearchResultCollector {
    provider: Arc<dyn SearchProvider>,
    fetcher: Arc<ContentFetcher>,
    overfetch: usize,
}

impl SearchResultCollector {
    pub fn new(provider: Arc<dyn SearchProvider>, fetcher: Arc<ContentFetcher>, overfetch: usize) -> Self {
        Self {
            provider,
            fetcher,
            overfetch,
        }
    }

    /// Walks the engine's hits in order and keeps the first `target_count`
    /// whose content could be fetched, skipping repeated URLs. Returns fewer
    /// when the hits run out. Search failures propagate; fetch failures
    /// only drop the hit.
    pub async fn collect(&self, query: &str, target_count: usize) -> Result<Vec<SearchResult>, ApiError> {
        if target_count == 0 {
            return Ok(Vec::new());
        }

        let requested = self.overfetch.max(target_count);
        let hits = self.provider.search(query, requested).await?;
        tracing::info!(
            "{} returned {} hits for '{}' (asked for {})",
            self.provider.name(),
            hits.len(),
            query,
            requested
        );

        let mut results: Vec<SearchResult> = Vec::with_capacity(target_count);
        for hit in hits {
            if results.len() >= target_count {
                break;
            }
            if results.iter().any(|r| r.url == hit.url) {
                tracing::debug!("Skipping duplicate result {}", hit.url);
                continue;
            }

            let Some(content) = self.fetcher.fetch(&hit.url).await else {
                continue;
            };

            results.push(SearchResult {
                position: results.len() + 1,
                url: hit.url,
                title: hit.title,
                description: hit.description,
                content,
            });
        }

        Ok(results)
    }
}

/// Reads `{title, link}` back out of a stored point's `search` metadata.
pub(crate) fn citation_fields(metadata: &Metadata) -> Option<(String, String)> {
    let search = metadata.get("search")?;
    let link = search.get("link").and_then(Value::as_str)?;
    let title = search.get("title").and_then(Value::as_str).unwrap_or(link);
    Some((title.to_string(), link.to_string()))
}
