use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::errors::ApiError;
use crate::rag::{ChannelNotifier, Notification, SearchResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub answer: String,
    pub results: Vec<SearchResult>,
    pub notifications: Vec<Notification>,
}

/// Runs one round. A failed round answers with the error status and an
/// `{error, notifications}` body, so progress sent before the failure and
/// the failure notice itself still reach the client.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let (notifier, mut rx) = ChannelNotifier::new();
    let outcome = state.pipeline.run(query, &notifier).await;
    drop(notifier);
    let notifications = drain(&mut rx);

    match outcome {
        Ok(outcome) => Ok(Json(SearchResponse {
            answer: outcome.answer,
            results: outcome.results,
            notifications,
        })
        .into_response()),
        Err(err) => {
            let (status, message) = err.status_and_message();
            let body = Json(json!({ "error": message, "notifications": notifications }));
            Ok((status, body).into_response())
        }
    }
}

fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut notifications = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        notifications.push(notification);
    }
    notifications
}
