//! SQLite-backed collection backend.
//!
//! Points live in one table keyed by collection name; similarity search is
//! brute-force cosine over the collection's rows. The scratch collection is
//! small and cleared every round, so no ANN index is kept.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::store::{
    check_dimension, rank_points, CollectionBackend, CollectionInfo, Metadata, Point, PointId,
    ScoredPoint, VectorCollection,
};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.vector_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embedder_name TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS points (
                point_id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_points_collection ON points(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn stored_info(&self, name: &str) -> Result<Option<(String, usize)>, ApiError> {
        let row = sqlx::query("SELECT embedder_name, dimension FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| {
            let embedder: String = row.get("embedder_name");
            let dimension: i64 = row.get("dimension");
            (embedder, dimension.max(0) as usize)
        }))
    }
}

#[async_trait]
impl CollectionBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    /// Opens `info.name`, dropping stale points when the embedder changed
    /// since the collection was last written.
    async fn create(&self, info: CollectionInfo) -> Result<Arc<dyn VectorCollection>, ApiError> {
        if let Some((embedder, dimension)) = self.stored_info(&info.name).await? {
            if embedder != info.embedder_name || dimension != info.dimension {
                tracing::info!(
                    "Embedder for collection '{}' changed ({}/{} -> {}/{}); dropping stored points",
                    info.name,
                    embedder,
                    dimension,
                    info.embedder_name,
                    info.dimension
                );
                sqlx::query("DELETE FROM points WHERE collection = ?1")
                    .bind(&info.name)
                    .execute(&self.pool)
                    .await
                    .map_err(ApiError::internal)?;
            }
        }

        sqlx::query(
            "INSERT OR REPLACE INTO collections (name, embedder_name, dimension, updated_at)
             VALUES (?1, ?2, ?3, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&info.name)
        .bind(&info.embedder_name)
        .bind(info.dimension as i64)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(Arc::new(SqliteCollection {
            pool: self.pool.clone(),
            info,
        }))
    }
}

pub struct SqliteCollection {
    pool: SqlitePool,
    info: CollectionInfo,
}

impl SqliteCollection {
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_point(row: &sqlx::sqlite::SqliteRow) -> Point {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Metadata>(&metadata_str).unwrap_or_default();
        let embedding_bytes: Vec<u8> = row.get("embedding");

        Point {
            id: row.get("point_id"),
            text: row.get("content"),
            embedding: Self::deserialize_embedding(&embedding_bytes),
            metadata,
        }
    }

    async fn load_points(&self) -> Result<Vec<Point>, ApiError> {
        let rows = sqlx::query(
            "SELECT point_id, content, metadata, embedding
             FROM points
             WHERE collection = ?1
             ORDER BY rowid",
        )
        .bind(&self.info.name)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(Self::row_to_point).collect())
    }
}

#[async_trait]
impl VectorCollection for SqliteCollection {
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
        let metadata_str = serde_json::to_string(&metadata).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO points (point_id, collection, content, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(&self.info.name)
        .bind(text)
        .bind(&metadata_str)
        .bind(Self::serialize_embedding(&embedding))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(id)
    }

    async fn get_all_points(&self) -> Result<Vec<Point>, ApiError> {
        self.load_points().await
    }

    async fn delete_points(&self, ids: &[PointId]) -> Result<usize, ApiError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        let mut removed = 0usize;
        for id in ids {
            let result = sqlx::query("DELETE FROM points WHERE collection = ?1 AND point_id = ?2")
                .bind(&self.info.name)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(ApiError::internal)?;

        Ok(removed)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredPoint>, ApiError> {
        check_dimension(&self.info, embedding)?;
        let points = self.load_points().await?;
        Ok(rank_points(points, embedding, k))
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points WHERE collection = ?1")
            .bind(&self.info.name)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(name: &str, embedder: &str, dimension: usize) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            embedder_name: embedder.to_string(),
            dimension,
        }
    }

    async fn backend(dir: &tempfile::TempDir) -> SqliteBackend {
        SqliteBackend::with_path(dir.path().join("vectors.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_query_and_metadata_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let coll = backend(&dir).await.create(info("search", "e", 3)).await.unwrap();

        let mut meta = Metadata::new();
        meta.insert(
            "search".to_string(),
            json!({ "title": "Paris", "link": "https://paris.example" }),
        );
        let id = coll.add_point("Paris is the capital", vec![1.0, 0.0, 0.0], meta).await.unwrap();
        coll.add_point("Rome is elsewhere", vec![0.0, 1.0, 0.0], Metadata::new())
            .await
            .unwrap();

        let hits = coll.query(&[1.0, 0.1, 0.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].point.id, id);
        assert_eq!(hits[0].point.metadata["search"]["link"], "https://paris.example");
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn collections_are_isolated_and_deletable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        let a = backend.create(info("a", "e", 2)).await.unwrap();
        let b = backend.create(info("b", "e", 2)).await.unwrap();

        let first = a.add_point("one", vec![1.0, 0.0], Metadata::new()).await.unwrap();
        let second = a.add_point("two", vec![0.0, 1.0], Metadata::new()).await.unwrap();
        b.add_point("other", vec![1.0, 1.0], Metadata::new()).await.unwrap();

        let ids: Vec<PointId> = a.get_all_points().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.clone(), second]);

        assert_eq!(a.delete_points(&ids).await.unwrap(), 2);
        assert_eq!(a.count().await.unwrap(), 0);
        assert_eq!(b.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reopening_with_new_embedder_drops_points() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;

        let coll = backend.create(info("search", "old", 2)).await.unwrap();
        coll.add_point("stale", vec![1.0, 0.0], Metadata::new()).await.unwrap();

        let same = backend.create(info("search", "old", 2)).await.unwrap();
        assert_eq!(same.count().await.unwrap(), 1);

        let changed = backend.create(info("search", "new", 4)).await.unwrap();
        assert_eq!(changed.count().await.unwrap(), 0);
    }
}
