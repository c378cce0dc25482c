use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::settings::SearchSettings;
use crate::core::errors::ApiError;

/// One raw hit from a search engine, in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `num_results` hits in the engine's own ranking.
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError>;
}

/// Picks the configured engine, falling back to DuckDuckGo when the chosen
/// one is missing credentials.
pub fn provider_from_settings(settings: &SearchSettings) -> Arc<dyn SearchProvider> {
    let client = Client::new();
    match settings.provider.as_str() {
        "google" => {
            if let (Some(key), Some(cx)) = (&settings.google_api_key, &settings.google_engine_id) {
                return Arc::new(GoogleSearch::new(client, key.clone(), cx.clone()));
            }
        }
        "brave" => {
            if let Some(key) = &settings.brave_api_key {
                return Arc::new(BraveSearch::new(client, key.clone()));
            }
        }
        "bing" => {
            if let Some(key) = &settings.bing_api_key {
                return Arc::new(BingSearch::new(client, key.clone()));
            }
        }
        "searxng" => {
            if let Some(url) = &settings.searxng_url {
                return Arc::new(SearxngSearch::new(client, url.clone()));
            }
        }
        "duckduckgo" => return Arc::new(DuckDuckGoSearch::new(client)),
        _ => {}
    }

    tracing::warn!(
        "Search provider '{}' is not fully configured; using DuckDuckGo",
        settings.provider
    );
    Arc::new(DuckDuckGoSearch::new(client))
}

async fn get_json(request: reqwest::RequestBuilder, engine: &str) -> Result<Value, ApiError> {
    let response = request.send().await.map_err(ApiError::upstream)?;

    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "{} search failed: {}",
            engine,
            response.status()
        )));
    }

    response.json().await.map_err(ApiError::upstream)
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Builds hits from a JSON array, dropping entries without a URL.
fn collect_hits(items: Option<&Vec<Value>>, url: &str, title: &str, description: &str) -> Vec<SearchHit> {
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let link = str_field(item, url);
            if link.is_empty() {
                return None;
            }
            Some(SearchHit {
                url: link.to_string(),
                title: str_field(item, title).to_string(),
                description: str_field(item, description).to_string(),
            })
        })
        .collect()
}

pub struct GoogleSearch {
    client: Client,
    api_key: String,
    engine_id: String,
}

impl GoogleSearch {
    pub fn new(client: Client, api_key: String, engine_id: String) -> Self {
        Self {
            client,
            api_key,
            engine_id,
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        // Custom Search caps a single page at 10.
        let num = num_results.clamp(1, 10);
        let url = format!(
            "https://www.googleapis.com/customsearch/v1?key={}&cx={}&q={}&num={}",
            self.api_key,
            self.engine_id,
            urlencoding::encode(query),
            num
        );

        let payload = get_json(self.client.get(url), "Google").await?;
        let mut hits = parse_google(&payload);
        hits.truncate(num_results);
        Ok(hits)
    }
}

fn parse_google(payload: &Value) -> Vec<SearchHit> {
    collect_hits(
        payload.get("items").and_then(|v| v.as_array()),
        "link",
        "title",
        "snippet",
    )
}

pub struct BraveSearch {
    client: Client,
    api_key: String,
}

impl BraveSearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            num_results.clamp(1, 20)
        );

        let request = self
            .client
            .get(url)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json");
        let payload = get_json(request, "Brave").await?;
        let mut hits = parse_brave(&payload);
        hits.truncate(num_results);
        Ok(hits)
    }
}

fn parse_brave(payload: &Value) -> Vec<SearchHit> {
    collect_hits(
        payload
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(|v| v.as_array()),
        "url",
        "title",
        "description",
    )
}

pub struct BingSearch {
    client: Client,
    api_key: String,
}

impl BingSearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    fn name(&self) -> &str {
        "bing"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        let url = format!(
            "https://api.bing.microsoft.com/v7.0/search?q={}&count={}",
            urlencoding::encode(query),
            num_results.clamp(1, 50)
        );

        let request = self
            .client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key);
        let payload = get_json(request, "Bing").await?;
        let mut hits = parse_bing(&payload);
        hits.truncate(num_results);
        Ok(hits)
    }
}

fn parse_bing(payload: &Value) -> Vec<SearchHit> {
    collect_hits(
        payload
            .get("webPages")
            .and_then(|wp| wp.get("value"))
            .and_then(|v| v.as_array()),
        "url",
        "name",
        "snippet",
    )
}

pub struct SearxngSearch {
    client: Client,
    base_url: String,
}

impl SearxngSearch {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    fn name(&self) -> &str {
        "searxng"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        let url = format!(
            "{}/search?q={}&format=json",
            self.base_url,
            urlencoding::encode(query)
        );

        let payload = get_json(self.client.get(url), "SearXNG").await?;
        let mut hits = parse_searxng(&payload);
        hits.truncate(num_results);
        Ok(hits)
    }
}

fn parse_searxng(payload: &Value) -> Vec<SearchHit> {
    collect_hits(
        payload.get("results").and_then(|v| v.as_array()),
        "url",
        "title",
        "content",
    )
}

pub struct DuckDuckGoSearch {
    client: Client,
}

impl DuckDuckGoSearch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ApiError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let payload = get_json(self.client.get(url), "DuckDuckGo").await?;
        let mut hits = parse_duckduckgo(&payload);
        hits.truncate(num_results);
        Ok(hits)
    }
}

fn parse_duckduckgo(payload: &Value) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = str_field(payload, "AbstractText");
    let abstract_url = str_field(payload, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = str_field(payload, "Heading");
        let title = if heading.is_empty() {
            abstract_text.split(" - ").next().unwrap_or(abstract_text)
        } else {
            heading
        };
        hits.push(SearchHit {
            url: abstract_url.to_string(),
            title: title.to_string(),
            description: abstract_text.to_string(),
        });
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut hits);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut hits);
    }

    hits
}

fn extract_ddg_topics(items: &[Value], hits: &mut Vec<SearchHit>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, hits);
            continue;
        }
        let text = str_field(item, "Text");
        let url = str_field(item, "FirstURL");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        hits.push(SearchHit {
            url: url.to_string(),
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            description: text.to_string(),
        });
    }
}
