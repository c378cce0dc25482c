use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::store::{CollectionBackend, CollectionInfo, PointId, VectorCollection};
use crate::core::errors::ApiError;
use crate::llm::{Embedder, EmbedderInfo};

/// Named collection handles. Lookups of unknown names fail with
/// `ApiError::NotFound`.
#[derive(Default)]
pub struct VectorMemory {
    collections: RwLock<HashMap<String, Arc<dyn VectorCollection>>>,
}

impl VectorMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Result<Arc<dyn VectorCollection>, ApiError> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("vector collection '{}'", name)))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    pub async fn register(&self, collection: Arc<dyn VectorCollection>) {
        let name = collection.info().name.clone();
        self.collections.write().await.insert(name, collection);
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Owns the lifecycle of the per-round scratch collection: created on first
/// use, emptied (never dropped) before each round.
pub struct ScratchCollectionManager {
    memory: Arc<VectorMemory>,
    backend: Arc<dyn CollectionBackend>,
    embedder: Arc<dyn Embedder>,
}

impl ScratchCollectionManager {
    pub fn new(
        memory: Arc<VectorMemory>,
        backend: Arc<dyn CollectionBackend>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            memory,
            backend,
            embedder,
        }
    }

    pub async fn ensure(&self, name: &str) -> Result<(), ApiError> {
        if self.memory.contains(name).await {
            return Ok(());
        }

        let embedder = EmbedderInfo::probe(self.embedder.as_ref()).await?;
        let info = CollectionInfo {
            name: name.to_string(),
            embedder_name: embedder.name,
            dimension: embedder.dimension,
        };
        tracing::info!(
            "Creating collection '{}' ({} backend, embedder {}, {} dimensions)",
            info.name,
            self.backend.name(),
            info.embedder_name,
            info.dimension
        );

        let collection = self.backend.create(info).await?;
        self.memory.register(collection).await;
        Ok(())
    }

    /// Deletes every point in `name`. Returns the number removed.
    pub async fn clear(&self, name: &str) -> Result<usize, ApiError> {
        let collection = self.memory.get(name).await?;
        let ids: Vec<PointId> = collection
            .get_all_points()
            .await?
            .into_iter()
            .map(|point| point.id)
            .collect();

        let removed = collection.delete_points(&ids).await?;
        tracing::debug!("Cleared {} points from '{}'", removed, name);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory::InMemoryBackend;
    use crate::rag::store::Metadata;
    use crate::rag::testing::HashEmbedder;

    fn manager(memory: Arc<VectorMemory>) -> ScratchCollectionManager {
        ScratchCollectionManager::new(
            memory,
            Arc::new(InMemoryBackend),
            Arc::new(HashEmbedder::new(8)),
        )
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let memory = VectorMemory::new();
        assert!(matches!(memory.get("search").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn ensure_creates_once_with_embedder_shape() {
        let memory = Arc::new(VectorMemory::new());
        let manager = manager(memory.clone());

        manager.ensure("search").await.unwrap();
        let first = memory.get("search").await.unwrap();
        assert_eq!(first.info().dimension, 8);
        assert_eq!(first.info().embedder_name, "hash-embedder");

        first.add_point("kept", vec![0.1; 8], Metadata::new()).await.unwrap();
        manager.ensure("search").await.unwrap();
        assert_eq!(memory.get("search").await.unwrap().count().await.unwrap(), 1);
        assert_eq!(memory.names().await, vec!["search".to_string()]);
    }

    #[tokio::test]
    async fn clear_empties_but_keeps_collection() {
        let memory = Arc::new(VectorMemory::new());
        let manager = manager(memory.clone());
        manager.ensure("search").await.unwrap();

        let coll = memory.get("search").await.unwrap();
        for i in 0..10 {
            coll.add_point(&format!("old {}", i), vec![i as f32; 8], Metadata::new())
                .await
                .unwrap();
        }

        assert_eq!(manager.clear("search").await.unwrap(), 10);
        assert_eq!(coll.count().await.unwrap(), 0);
        assert!(memory.contains("search").await);
        assert_eq!(manager.clear("search").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_of_missing_collection_fails() {
        let manager = manager(Arc::new(VectorMemory::new()));
        assert!(matches!(manager.clear("nope").await, Err(ApiError::NotFound(_))));
    }
}
