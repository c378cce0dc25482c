//! Web page retrieval and main-content extraction.
//!
//! `HttpPageFetcher` does the network part with the same guard rails the
//! rest of the backend applies to outbound requests (scheme check, host
//! denylist, private address blocking, byte cap, timeout). `ContentFetcher`
//! turns a page into a bounded slice of readable text and never fails:
//! every error is logged and reported as "no content".

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use reqwest::{redirect::Policy, Client, Url};

use crate::core::config::settings::FetchSettings;
use crate::core::errors::ApiError;

const MAX_REDIRECTS: usize = 5;
const MIN_BLOCK_CHARS: usize = 20;
const SKIPPED_TEXT_PARENTS: [&str; 4] = ["script", "style", "noscript", "template"];
const BOILERPLATE_MARKERS: [&str; 14] = [
    "nav",
    "navbar",
    "menu",
    "sidebar",
    "footer",
    "header",
    "banner",
    "cookie",
    "consent",
    "ads",
    "advert",
    "promo",
    "subscribe",
    "newsletter",
];

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ApiError>;
}

/// Fetches a URL and returns its extracted main text, cut to `max_chars`
/// characters. Returns `None` on any failure.
pub struct ContentFetcher {
    fetcher: Arc<dyn PageFetcher>,
    max_chars: usize,
}

impl ContentFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_chars: usize) -> Self {
        Self { fetcher, max_chars }
    }

    pub async fn fetch(&self, url: &str) -> Option<String> {
        let page = match self.fetcher.fetch_page(url).await {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!("Error fetching content from {}: {}", url, err);
                return None;
            }
        };

        match extract_main_text(&page.body, page.content_type.as_deref()) {
            Some(text) => Some(truncate_chars(&text, self.max_chars)),
            None => {
                tracing::warn!("No extractable content at {}", url);
                None
            }
        }
    }
}

/// Keeps the first `max_chars` characters (not bytes, not words).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

pub struct HttpPageFetcher {
    client: Client,
    max_bytes: usize,
    allow_private_hosts: bool,
    denylist: Vec<String>,
}

impl HttpPageFetcher {
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, ApiError> {
        let denylist = if settings.url_denylist.is_empty() {
            default_denylist()
        } else {
            settings.url_denylist.clone()
        };

        let allow_private_hosts = settings.allow_private_hosts;
        let redirect_denylist = denylist.clone();
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private_hosts && is_blocked_target(attempt.url(), &redirect_denylist)
            {
                attempt.error("redirect to a blocked host")
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .redirect(policy)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(30)))
            .user_agent(concat!("search-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
            allow_private_hosts,
            denylist,
        })
    }

    async fn validate_target(&self, parsed: &Url) -> Result<(), ApiError> {
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ApiError::BadRequest(
                "Only http/https URLs are supported".to_string(),
            ));
        }

        if self.allow_private_hosts {
            return Ok(());
        }

        if is_blocked_target(parsed, &self.denylist) {
            return Err(ApiError::Forbidden);
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ApiError::BadRequest("URL host is missing".to_string()))?;
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        let addresses = tokio::net::lookup_host((host, port))
            .await
            .map_err(ApiError::upstream)?;
        let mut resolved = false;
        for address in addresses {
            resolved = true;
            if is_blocked_ip(address.ip()) {
                return Err(ApiError::Forbidden);
            }
        }
        if !resolved {
            return Err(ApiError::BadRequest(
                "URL host could not be resolved".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ApiError> {
        let parsed = Url::parse(url.trim()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        self.validate_target(&parsed).await?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(ApiError::upstream)?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Fetch failed: {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(ApiError::upstream)?;
            let room = self.max_bytes.saturating_sub(bytes.len());
            if chunk.len() >= room {
                bytes.extend_from_slice(&chunk[..room]);
                tracing::debug!("Body of {} cut at {} bytes", url, self.max_bytes);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            content_type,
            body: String::from_utf8_lossy(&bytes).to_string(),
        })
    }
}

/// Extracts readable main content. HTML goes through block scoring;
/// anything else is returned trimmed. `None` means nothing readable.
pub fn extract_main_text(body: &str, content_type: Option<&str>) -> Option<String> {
    let is_html = match content_type {
        Some(ct) => ct.to_ascii_lowercase().contains("html"),
        None => looks_like_html(body),
    };

    let text = if is_html {
        let doc = Html::parse_document(body);
        pick_main_text(&doc).or_else(|| paragraph_text(&doc))?
    } else {
        normalize_whitespace(body)
    };

    (!text.is_empty()).then_some(text)
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html") || head.contains("<body")
}

fn normalize_whitespace(text: &str) -> String {
    static WS: OnceLock<Option<Regex>> = OnceLock::new();
    match WS.get_or_init(|| Regex::new(r"\s+").ok()) {
        Some(ws) => ws.replace_all(text, " ").trim().to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Text of `el` without script/style bodies.
fn visible_text(el: &ElementRef) -> String {
    let parts: Vec<&str> = el
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?;
            if let Some(parent_el) = parent.value().as_element() {
                if SKIPPED_TEXT_PARENTS.contains(&parent_el.name()) {
                    return None;
                }
            }
            Some(&**text)
        })
        .collect();
    normalize_whitespace(&parts.join(" "))
}

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &ElementRef) -> bool {
    let marker = class_or_id_lc(el);
    !marker.is_empty() && BOILERPLATE_MARKERS.iter().any(|bad| marker.contains(bad))
}

fn link_text_chars(el: &ElementRef, links: &Selector) -> usize {
    el.select(links)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

/// Picks the densest non-navigation block, favouring `<article>`/`<main>`.
fn pick_main_text(doc: &Html) -> Option<String> {
    let blocks = Selector::parse("article, main, section, div").ok()?;
    let links = Selector::parse("a").ok()?;

    let mut best_score: i64 = 0;
    let mut best_text: Option<String> = None;

    for el in doc.select(&blocks) {
        if is_boilerplate_container(&el) {
            continue;
        }
        let text = visible_text(&el);
        let chars = text.chars().count();
        if chars < MIN_BLOCK_CHARS {
            continue;
        }

        let link_chars = link_text_chars(&el, &links);
        let mut score = chars as i64 - 2 * link_chars as i64;
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_chars > chars / 2 {
            score -= 500;
        }

        if score > best_score {
            best_score = score;
            best_text = Some(text);
        }
    }

    best_text
}

fn paragraph_text(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title, h1, h2, h3, p, li, pre").ok()?;
    let parts: Vec<String> = doc
        .select(&sel)
        .map(|el| visible_text(&el))
        .filter(|t| !t.is_empty())
        .collect();
    let joined = parts.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn default_denylist() -> Vec<String> {
    ["localhost", "*.localhost", "*.local", "*.internal", "metadata.google.internal"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Host is denylisted or is a literal private/loopback address.
fn is_blocked_target(url: &Url, denylist: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if denylist
        .iter()
        .any(|pattern| host_matches_pattern(host, pattern))
    {
        return true;
    }
    host.parse::<IpAddr>().map(is_blocked_ip).unwrap_or(false)
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        || octets[0] == 0
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

fn host_matches_pattern(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix('*') {
        return host.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return host.starts_with(prefix);
    }
    host == pattern
}
