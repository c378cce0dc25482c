//! Process-local collection backend. Nothing survives a restart.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    check_dimension, rank_points, CollectionBackend, CollectionInfo, Metadata, Point, PointId,
    ScoredPoint, VectorCollection,
};
use crate::core::errors::ApiError;

pub struct InMemoryCollection {
    info: CollectionInfo,
    points: RwLock<Vec<Point>>,
}

impl InMemoryCollection {
    pub fn new(info: CollectionInfo) -> Self {
        Self {
            info,
            points: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorCollection for InMemoryCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn add_point(
        &self,
        text: &str,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<PointId, ApiError> {
        check_dimension(&self.info, &embedding)?;

        let id = Uuid::new_v4().to_string();
        self.points.write().await.push(Point {
            id: id.clone(),
            text: text.to_string(),
            embedding,
            metadata,
        });
        Ok(id)
    }

    async fn get_all_points(&self) -> Result<Vec<Point>, ApiError> {
        Ok(self.points.read().await.clone())
    }

    async fn delete_points(&self, ids: &[PointId]) -> Result<usize, ApiError> {
        let mut points = self.points.write().await;
        let before = points.len();
        points.retain(|point| !ids.contains(&point.id));
        Ok(before - points.len())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredPoint>, ApiError> {
        check_dimension(&self.info, embedding)?;
        let points = self.points.read().await.clone();
        Ok(rank_points(points, embedding, k))
    }

    async fn count(&self) -> Result<usize, ApiError> {
        Ok(self.points.read().await.len())
    }
}

#[derive(Default)]
pub struct InMemoryBackend;

#[async_trait]
impl CollectionBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, info: CollectionInfo) -> Result<Arc<dyn VectorCollection>, ApiError> {
        Ok(Arc::new(InMemoryCollection::new(info)))
    }
}
