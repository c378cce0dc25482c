//! Deterministic collaborators for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::chunker::{TextChunk, TextSplitter};
use super::notify::{Notification, NotificationKind, Notifier};
use crate::core::errors::ApiError;
use crate::llm::{Embedder, Generator};
use crate::tools::fetch::{FetchedPage, PageFetcher};
use crate::tools::search::{SearchHit, SearchProvider};

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
/// Texts sharing words land close together.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            out[(hash % self.dimension as u64) as usize] += 1.0;
        }
        out
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> Option<&str> {
        Some("hash-embedder")
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        Ok(self.vector(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Returns a fixed answer and records every prompt it was given.
pub struct ScriptedGenerator {
    answer: Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().map_err(ApiError::Upstream)
    }
}

pub fn hit(url: &str, title: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        description: format!("About {}", title),
    }
}

pub struct StaticSearch {
    hits: Result<Vec<SearchHit>, String>,
    pub requested: Mutex<Vec<usize>>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits: Ok(hits),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Err(message.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        self.requested.lock().unwrap().push(num_results);
        let hits = self.hits.clone().map_err(ApiError::Upstream)?;
        Ok(hits.into_iter().take(num_results).collect())
    }
}

/// Serves canned pages by URL; unknown URLs fail.
#[derive(Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, Result<FetchedPage, String>>,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(FetchedPage {
                content_type: Some("text/html".to_string()),
                body: html.to_string(),
            }),
        );
        self
    }

    pub fn with_text(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(FetchedPage {
                content_type: Some("text/plain".to_string()),
                body: text.to_string(),
            }),
        );
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.pages
            .insert(url.to_string(), Err("connection reset".to_string()));
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ApiError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(msg)) => Err(ApiError::Upstream(msg.clone())),
            None => Err(ApiError::NotFound(url.to_string())),
        }
    }
}

/// Returns preset chunks: `overlapping` for the default mode, `plain` for
/// `Some(0)`.
pub struct FixedSplitter {
    overlapping: Vec<String>,
    plain: Vec<String>,
}

impl FixedSplitter {
    pub fn new(overlapping: &[&str], plain: &[&str]) -> Self {
        Self {
            overlapping: overlapping.iter().map(|s| s.to_string()).collect(),
            plain: plain.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter for FixedSplitter {
    fn split(&self, _text: &str, overlap: Option<usize>) -> Vec<TextChunk> {
        let source = if overlap == Some(0) {
            &self.plain
        } else {
            &self.overlapping
        };
        source
            .iter()
            .map(|text| TextChunk { text: text.clone() })
            .collect()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.events.lock().unwrap().push(Notification {
            kind: NotificationKind::Progress,
            message: message.to_string(),
        });
    }

    fn notify_error(&self, message: &str) {
        self.events.lock().unwrap().push(Notification {
            kind: NotificationKind::Error,
            message: message.to_string(),
        });
    }
}
