use crate::error::IndexError;
use crate::models::{Distance, IndexedPoint, PointId, ScoredPoint, SearchParams};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

const BACKEND: &str = "memory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    points: BTreeMap<u64, IndexedPoint>,
}

/// Process-local index with the same contract as the Qdrant store. Used for
/// tests and for running the pipelines without an index service.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|stored| stored.points.len())
    }
}

fn missing(collection: &str) -> String {
    format!("collection '{collection}' does not exist")
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let mut names = self
            .collections
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort_unstable();
        Ok(names)
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, IndexError> {
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|stored| stored.dimensions))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        _distance: Distance,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(IndexError::Collection {
                backend: BACKEND.to_string(),
                collection: name.to_string(),
                details: "collection already exists".to_string(),
            });
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimensions,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::Write {
                backend: BACKEND.to_string(),
                collection: collection.to_string(),
                details: missing(collection),
            })?;

        if let Some(point) = points
            .iter()
            .find(|point| point.vector.len() != stored.dimensions)
        {
            return Err(IndexError::DimensionMismatch {
                collection: collection.to_string(),
                expected: stored.dimensions,
                actual: point.vector.len(),
            });
        }

        for point in points {
            stored.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let collections = self.collections.read().await;
        let stored = collections.get(collection).ok_or_else(|| IndexError::Search {
            backend: BACKEND.to_string(),
            collection: collection.to_string(),
            details: missing(collection),
        })?;

        if vector.len() != stored.dimensions {
            return Err(IndexError::DimensionMismatch {
                collection: collection.to_string(),
                expected: stored.dimensions,
                actual: vector.len(),
            });
        }

        let mut scored = stored
            .points
            .values()
            .map(|point| (cosine(&point.vector, vector), point))
            .filter(|(score, _)| params.score_threshold.map_or(true, |min| *score >= min))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(params.limit);

        Ok(scored
            .into_iter()
            .map(|(score, point)| ScoredPoint {
                id: PointId::Num(point.id),
                score,
                payload: params.with_payload.then(|| {
                    let mut payload = Map::new();
                    payload.insert("text".to_string(), Value::String(point.payload.text.clone()));
                    payload
                }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkPayload;

    fn point(id: u64, vector: Vec<f32>, text: &str) -> IndexedPoint {
        IndexedPoint {
            id,
            vector,
            payload: ChunkPayload {
                text: text.to_string(),
            },
        }
    }

    fn params(limit: usize, threshold: Option<f32>) -> SearchParams {
        SearchParams {
            limit,
            score_threshold: threshold,
            with_payload: true,
        }
    }

    #[tokio::test]
    async fn search_orders_filters_and_limits() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        index
            .upsert(
                "docs",
                &[
                    point(0, vec![1.0, 0.0], "east"),
                    point(1, vec![0.0, 1.0], "north"),
                    point(2, vec![1.0, 1.0], "north-east"),
                    point(3, vec![-1.0, 0.0], "west"),
                ],
            )
            .await
            .unwrap();

        let hits = index.search("docs", &[1.0, 0.2], params(2, Some(0.5))).await.unwrap();
        let texts = hits.iter().filter_map(ScoredPoint::text).collect::<Vec<_>>();
        assert_eq!(texts, vec!["east", "north-east"]);
        assert!(hits[0].score >= hits[1].score);

        let hits = index.search("docs", &[1.0, 0.2], params(10, Some(0.5))).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn upsert_overwrites_matching_ids() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        index.upsert("docs", &[point(0, vec![1.0, 0.0], "old")]).await.unwrap();
        index.upsert("docs", &[point(0, vec![1.0, 0.0], "new")]).await.unwrap();

        assert_eq!(index.point_count("docs").await, Some(1));
        let hits = index.search("docs", &[1.0, 0.0], params(5, None)).await.unwrap();
        assert_eq!(hits[0].text(), Some("new"));
    }

    #[tokio::test]
    async fn recreate_discards_previous_points() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        index.upsert("docs", &[point(7, vec![1.0, 0.0], "stale")]).await.unwrap();

        index.recreate_collection("docs", 2, Distance::Cosine).await.unwrap();
        assert_eq!(index.point_count("docs").await, Some(0));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_hard_failure() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 3, Distance::Cosine).await.unwrap();

        let write = index.upsert("docs", &[point(0, vec![1.0, 0.0], "short")]).await;
        assert!(matches!(write, Err(IndexError::DimensionMismatch { expected: 3, actual: 2, .. })));

        let search = index.search("docs", &[1.0], params(5, None)).await;
        assert!(matches!(search, Err(IndexError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn missing_collection_errors_by_operation() {
        let index = InMemoryIndex::new();
        assert!(!index.collection_exists("absent").await.unwrap());
        assert!(matches!(
            index.upsert("absent", &[point(0, vec![1.0], "x")]).await,
            Err(IndexError::Write { .. })
        ));
        assert!(matches!(
            index.search("absent", &[1.0], params(1, None)).await,
            Err(IndexError::Search { .. })
        ));
    }

    #[tokio::test]
    async fn payload_is_omitted_when_not_requested() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 1, Distance::Cosine).await.unwrap();
        index.upsert("docs", &[point(0, vec![2.0], "x")]).await.unwrap();

        let hits = index
            .search(
                "docs",
                &[1.0],
                SearchParams {
                    limit: 1,
                    score_threshold: None,
                    with_payload: false,
                },
            )
            .await
            .unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[0].payload.is_none());
        assert_eq!(hits[0].text(), None);
    }
}
