use crate::error::IndexError;
use crate::models::{Distance, IndexedPoint, ScoredPoint, SearchParams};
use async_trait::async_trait;
use std::sync::Arc;

/// A vector index holding named collections of `(id, vector, payload)` points.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError>;

    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|collection| collection == name))
    }

    /// Vector size of an existing collection, `None` if it does not exist.
    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, IndexError>;

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError>;

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError>;

    /// Drops the collection if present and creates it empty.
    async fn recreate_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        if self.collection_exists(name).await? {
            self.delete_collection(name).await?;
        }
        self.create_collection(name, dimensions, distance).await
    }

    /// Writes all points in one batch; points with an existing id are replaced.
    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<(), IndexError>;

    /// Nearest neighbours of `vector`, best first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredPoint>, IndexError>;
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Arc<T> {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        (**self).list_collections().await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        (**self).collection_exists(name).await
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, IndexError> {
        (**self).collection_dimensions(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        (**self).create_collection(name, dimensions, distance).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        (**self).delete_collection(name).await
    }

    async fn recreate_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        (**self).recreate_collection(name, dimensions, distance).await
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<(), IndexError> {
        (**self).upsert(collection, points).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        (**self).search(collection, vector, params).await
    }
}
