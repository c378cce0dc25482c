use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const SEARCH_PROVIDERS: [&str; 5] = ["duckduckgo", "google", "brave", "bing", "searxng"];
const VECTOR_BACKENDS: [&str; 2] = ["memory", "sqlite"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    validate_u64_field(root, "search_max_results", "search_max_results", 1, 50)?;

    if let Some(search) = expect_optional_object(root, "search")? {
        validate_u64_field(
            search,
            "search.search_max_results",
            "search_max_results",
            1,
            50,
        )?;
        validate_enum_field(search, "search.provider", "provider", &SEARCH_PROVIDERS)?;
        validate_u64_field(search, "search.overfetch", "overfetch", 1, 100)?;
        for key in [
            "google_search_api_key",
            "google_search_engine_id",
            "brave_search_api_key",
            "bing_search_api_key",
            "searxng_url",
        ] {
            validate_optional_string_field(search, &format!("search.{}", key), key)?;
        }
    }

    if let Some(fetch) = expect_optional_object(root, "fetch")? {
        validate_u64_field(fetch, "fetch.max_chars", "max_chars", 1, 5_000_000)?;
        validate_u64_field(fetch, "fetch.max_bytes", "max_bytes", 1, 100_000_000)?;
        validate_u64_field(fetch, "fetch.timeout_secs", "timeout_secs", 1, 86_400)?;
        validate_bool_field(fetch, "fetch.allow_private_hosts", "allow_private_hosts")?;
        validate_string_array_field(fetch, "fetch.url_denylist", "url_denylist")?;
    }

    if let Some(chunker) = expect_optional_object(root, "chunker")? {
        validate_u64_field(chunker, "chunker.chunk_size", "chunk_size", 16, 100_000)?;
        validate_u64_field(chunker, "chunker.chunk_overlap", "chunk_overlap", 0, 100_000)?;
        let size = chunker.get("chunk_size").and_then(|v| v.as_u64());
        let overlap = chunker.get("chunk_overlap").and_then(|v| v.as_u64());
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'chunker.chunk_overlap': must be smaller than chunk_size"
                        .to_string(),
                ));
            }
        }
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_u64_field(
            ingest,
            "ingest.notify_interval_secs",
            "notify_interval_secs",
            0,
            86_400,
        )?;
        validate_u64_field(ingest, "ingest.insert_delay_ms", "insert_delay_ms", 0, 60_000)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        for key in ["base_url", "api_key", "chat_model", "embedding_model"] {
            validate_optional_string_field(llm, &format!("llm.{}", key), key)?;
        }
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 86_400)?;
        validate_u64_field(llm, "llm.max_attempts", "max_attempts", 1, 10)?;
        validate_u64_field(llm, "llm.retry_backoff_ms", "retry_backoff_ms", 0, 60_000)?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
    }

    if let Some(store) = expect_optional_object(root, "vector_store")? {
        validate_enum_field(store, "vector_store.backend", "backend", &VECTOR_BACKENDS)?;
        validate_non_empty_string_field(store, "vector_store.collection", "collection")?;
    }

    if let Some(synthesis) = expect_optional_object(root, "synthesis")? {
        validate_optional_string_field(synthesis, "synthesis.citation_label", "citation_label")?;
        validate_optional_string_field(
            synthesis,
            "synthesis.references_label",
            "references_label",
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(server, "server.cors_allowed_origins", "cors_allowed_origins")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn out_of_range<T: std::fmt::Display>(path: &str, min: T, max: T) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': must be between {} and {}",
        path, min, max
    ))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_is_valid() {
        assert!(validate_config(&json!({})).is_ok());
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(validate_config(&json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_zero_search_max_results() {
        let err = validate_config(&json!({ "search_max_results": 0 })).expect_err("invalid");
        assert!(err.to_string().contains("search_max_results"));
    }

    #[test]
    fn rejects_unknown_provider_and_backend() {
        assert!(validate_config(&json!({ "search": { "provider": "altavista" } })).is_err());
        assert!(validate_config(&json!({ "vector_store": { "backend": "qdrant" } })).is_err());
        assert!(validate_config(&json!({ "search": { "provider": "brave" } })).is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "chunker": { "chunk_size": 100, "chunk_overlap": 100 }
        }))
        .expect_err("overlap too large");
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(validate_config(&json!({ "fetch": { "allow_private_hosts": "yes" } })).is_err());
        assert!(validate_config(&json!({ "llm": { "temperature": "hot" } })).is_err());
        assert!(validate_config(&json!({ "fetch": { "url_denylist": ["", "x"] } })).is_err());
    }
}
