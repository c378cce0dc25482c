//! Vector collection interface shared by the scratch-collection backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub type PointId = String;
pub type Metadata = Map<String, Value>;

/// A text waiting to be stored, plus the metadata it will carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }
}

/// A stored vector with its text and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: Point,
    /// Cosine similarity (higher = closer).
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub embedder_name: String,
    pub dimension: usize,
}

#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn info(&self) -> &CollectionInfo;

    async fn add_point(
        &self,
        text: &str,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<PointId, ApiError>;

    /// All points in insertion order.
    async fn get_all_points(&self) -> Result<Vec<Point>, ApiError>;

    /// Returns how many of `ids` were removed.
    async fn delete_points(&self, ids: &[PointId]) -> Result<usize, ApiError>;

    /// Nearest neighbours by cosine similarity, best first. Ties keep
    /// insertion order.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredPoint>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;
}

/// Creates collections for the registry. Implemented per storage backend.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, info: CollectionInfo) -> Result<Arc<dyn VectorCollection>, ApiError>;
}

pub(crate) fn check_dimension(info: &CollectionInfo, embedding: &[f32]) -> Result<(), ApiError> {
    if embedding.len() != info.dimension {
        return Err(ApiError::BadRequest(format!(
            "collection '{}' expects {}-dimensional vectors, got {}",
            info.name,
            info.dimension,
            embedding.len()
        )));
    }
    Ok(())
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Scores `points` against `query` and keeps the best `k`.
pub(crate) fn rank_points(points: Vec<Point>, query: &[f32], k: usize) -> Vec<ScoredPoint> {
    let mut scored: Vec<ScoredPoint> = points
        .into_iter()
        .map(|point| {
            let score = cosine_similarity(query, &point.embedding);
            ScoredPoint { point, score }
        })
        .collect();

    // stable sort keeps insertion order among equal scores
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
