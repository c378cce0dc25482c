//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty config produces a working
//! DuckDuckGo + in-memory setup; validation has already rejected malformed
//! values by the time these readers run.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 3;
pub const DEFAULT_COLLECTION_NAME: &str = "search";

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Target number of usable results per round; also the `k` used when
    /// attributing answer chunks to sources.
    pub search_max_results: usize,
    pub search: SearchSettings,
    pub fetch: FetchSettings,
    pub chunker: ChunkerSettings,
    pub ingest: IngestSettings,
    pub llm: LlmSettings,
    pub vector_store: VectorStoreSettings,
    pub synthesis: SynthesisSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSettings {
    pub provider: String,
    pub overfetch: usize,
    #[serde(skip)]
    pub google_api_key: Option<String>,
    pub google_engine_id: Option<String>,
    #[serde(skip)]
    pub brave_api_key: Option<String>,
    #[serde(skip)]
    pub bing_api_key: Option<String>,
    pub searxng_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSettings {
    pub max_chars: usize,
    pub max_bytes: usize,
    pub timeout_secs: u64,
    pub allow_private_hosts: bool,
    pub url_denylist: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkerSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSettings {
    pub notify_interval: Duration,
    pub insert_delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
    pub retry_backoff: Duration,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorStoreSettings {
    pub backend: String,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisSettings {
    pub citation_label: String,
    pub references_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Settings {
    pub fn from_config(config: &Value) -> Self {
        let search_max_results = config
            .get("search_max_results")
            .or_else(|| section(config, "search").get("search_max_results"))
            .and_then(|v| v.as_u64())
            .map(|v| v.clamp(1, 50) as usize)
            .unwrap_or(DEFAULT_SEARCH_MAX_RESULTS);

        Self {
            search_max_results,
            search: SearchSettings::from_section(section(config, "search")),
            fetch: FetchSettings::from_section(section(config, "fetch")),
            chunker: ChunkerSettings::from_section(section(config, "chunker")),
            ingest: IngestSettings::from_section(section(config, "ingest")),
            llm: LlmSettings::from_section(section(config, "llm")),
            vector_store: VectorStoreSettings::from_section(section(config, "vector_store")),
            synthesis: SynthesisSettings::from_section(section(config, "synthesis")),
            server: ServerSettings::from_section(section(config, "server")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Value::Null)
    }
}

impl SearchSettings {
    fn from_section(s: &Value) -> Self {
        Self {
            provider: string_or(s, "provider", "duckduckgo"),
            overfetch: u64_or(s, "overfetch", 10) as usize,
            google_api_key: non_empty_string(s, "google_search_api_key"),
            google_engine_id: non_empty_string(s, "google_search_engine_id"),
            brave_api_key: non_empty_string(s, "brave_search_api_key"),
            bing_api_key: non_empty_string(s, "bing_search_api_key"),
            searxng_url: non_empty_string(s, "searxng_url"),
        }
    }
}

impl FetchSettings {
    fn from_section(s: &Value) -> Self {
        let url_denylist = s
            .get("url_denylist")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            max_chars: u64_or(s, "max_chars", 2000) as usize,
            max_bytes: u64_or(s, "max_bytes", 1_000_000) as usize,
            timeout_secs: u64_or(s, "timeout_secs", 10),
            allow_private_hosts: s
                .get("allow_private_hosts")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            url_denylist,
        }
    }
}

impl ChunkerSettings {
    fn from_section(s: &Value) -> Self {
        let chunk_size = u64_or(s, "chunk_size", 512) as usize;
        let chunk_overlap = (u64_or(s, "chunk_overlap", 128) as usize).min(chunk_size / 2);
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

impl IngestSettings {
    fn from_section(s: &Value) -> Self {
        Self {
            notify_interval: Duration::from_secs(u64_or(s, "notify_interval_secs", 10)),
            insert_delay: Duration::from_millis(u64_or(s, "insert_delay_ms", 50)),
        }
    }
}

impl LlmSettings {
    fn from_section(s: &Value) -> Self {
        Self {
            base_url: string_or(s, "base_url", "http://localhost:1234"),
            api_key: non_empty_string(s, "api_key"),
            chat_model: string_or(s, "chat_model", "default"),
            embedding_model: string_or(s, "embedding_model", "text-embedding"),
            timeout_secs: u64_or(s, "timeout_secs", 120),
            max_attempts: u64_or(s, "max_attempts", 3).max(1) as usize,
            retry_backoff: Duration::from_millis(u64_or(s, "retry_backoff_ms", 500)),
            temperature: s.get("temperature").and_then(|v| v.as_f64()),
        }
    }
}

impl VectorStoreSettings {
    fn from_section(s: &Value) -> Self {
        Self {
            backend: string_or(s, "backend", "memory"),
            collection: string_or(s, "collection", DEFAULT_COLLECTION_NAME),
        }
    }
}

impl SynthesisSettings {
    fn from_section(s: &Value) -> Self {
        Self {
            citation_label: string_or(s, "citation_label", "Citation"),
            references_label: string_or(s, "references_label", "References"),
        }
    }
}

impl ServerSettings {
    fn from_section(s: &Value) -> Self {
        let cors_allowed_origins = s
            .get("cors_allowed_origins")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: string_or(s, "host", "127.0.0.1"),
            port: u64_or(s, "port", 0).min(u16::MAX as u64) as u16,
            cors_allowed_origins,
        }
    }
}

static NULL: Value = Value::Null;

fn section<'a>(config: &'a Value, key: &str) -> &'a Value {
    config.get(key).unwrap_or(&NULL)
}

fn u64_or(section: &Value, key: &str, default: u64) -> u64 {
    section.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}

fn string_or(section: &Value, key: &str, default: &str) -> String {
    non_empty_string(section, key).unwrap_or_else(|| default.to_string())
}

fn non_empty_string(section: &Value, key: &str) -> Option<String> {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
