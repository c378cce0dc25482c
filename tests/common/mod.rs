#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use search_rag::core::config::settings::{IngestSettings, SynthesisSettings};
use search_rag::core::errors::ApiError;
use search_rag::llm::{Embedder, Generator};
use search_rag::rag::{
    AnswerSynthesizer, CollectionBackend, DocumentIngestor, RecursiveTextSplitter,
    ScratchCollectionManager, SearchPipeline, SearchResultCollector, TextSplitter, VectorMemory,
};
use search_rag::tools::fetch::{ContentFetcher, FetchedPage, PageFetcher};
use search_rag::tools::search::{SearchHit, SearchProvider};

pub const DIM: usize = 32;

/// Bag-of-words embedder. A non-zero `delay` makes every call sleep so
/// concurrent callers actually interleave.
#[derive(Default)]
pub struct WordEmbedder {
    pub delay: Duration,
}

impl WordEmbedder {
    async fn pause(&self) {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            out[bucket % DIM] += 1.0;
        }
        out
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> Option<&str> {
        Some("word-embedder")
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.pause().await;
        Ok(Self::vector(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        self.pause().await;
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

pub struct EchoGenerator {
    answer: String,
}

impl EchoGenerator {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
        }
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ApiError> {
        Ok(self.answer.clone())
    }
}

pub struct FixedSearch {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, _query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        Ok(self.hits.iter().take(num_results).cloned().collect())
    }
}

pub struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        Err(ApiError::Upstream("search engine unavailable".to_string()))
    }
}

/// Returns a different hit list per query.
#[derive(Default)]
pub struct RoutedSearch {
    routes: HashMap<String, Vec<SearchHit>>,
}

impl RoutedSearch {
    pub fn route(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.routes.insert(query.to_string(), hits);
        self
    }
}

#[async_trait]
impl SearchProvider for RoutedSearch {
    fn name(&self) -> &str {
        "routed"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        tokio::task::yield_now().await;
        Ok(self
            .routes
            .get(query)
            .map(|hits| hits.iter().take(num_results).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FixedPages {
    pages: HashMap<String, String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FixedPages {
    pub fn with(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for FixedPages {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ApiError> {
        tokio::task::yield_now().await;
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .map(|text| FetchedPage {
                content_type: Some("text/plain".to_string()),
                body: text.clone(),
            })
            .ok_or_else(|| ApiError::Upstream(format!("unreachable: {}", url)))
    }
}

pub fn hit(url: &str, title: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        description: String::new(),
    }
}

pub fn labels() -> SynthesisSettings {
    SynthesisSettings {
        citation_label: "Citation".to_string(),
        references_label: "References".to_string(),
    }
}

/// Pipeline over fakes; returns the registry so tests can inspect it.
pub fn pipeline(
    hits: Vec<SearchHit>,
    pages: FixedPages,
    answer: &str,
    backend: Arc<dyn CollectionBackend>,
    max_results: usize,
) -> (SearchPipeline, Arc<VectorMemory>) {
    pipeline_with(
        Arc::new(FixedSearch { hits }),
        pages,
        answer,
        backend,
        max_results,
        WordEmbedder::default(),
    )
}

pub fn pipeline_with(
    search: Arc<dyn SearchProvider>,
    pages: FixedPages,
    answer: &str,
    backend: Arc<dyn CollectionBackend>,
    max_results: usize,
    embedder: WordEmbedder,
) -> (SearchPipeline, Arc<VectorMemory>) {
    let memory = Arc::new(VectorMemory::new());
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    let splitter: Arc<dyn TextSplitter> = Arc::new(RecursiveTextSplitter::new(120, 30));
    let ingest = IngestSettings {
        notify_interval: Duration::from_secs(10),
        insert_delay: Duration::ZERO,
    };

    let collector = SearchResultCollector::new(
        search,
        Arc::new(ContentFetcher::new(Arc::new(pages), 2000)),
        10,
    );
    let pipeline = SearchPipeline::new(
        collector,
        ScratchCollectionManager::new(memory.clone(), backend, embedder.clone()),
        DocumentIngestor::new(memory.clone(), embedder.clone(), &ingest),
        AnswerSynthesizer::new(
            Arc::new(EchoGenerator::new(answer)),
            embedder,
            splitter.clone(),
            memory.clone(),
            "search",
            max_results,
            labels(),
        ),
        splitter,
        "search",
        max_results,
    );
    (pipeline, memory)
}
