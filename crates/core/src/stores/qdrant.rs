use crate::error::IndexError;
use crate::models::{Distance, IndexedPoint, ScoredPoint, SearchParams};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::{ParseError, Url};

const BACKEND: &str = "qdrant";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Debug, Deserialize)]
struct CollectionName {
    name: String,
}

/// Qdrant over its REST API.
pub struct QdrantStore {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, IndexError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(IndexError::Url(ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        Ok(Self {
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client: Client::new(),
        })
    }

    fn url(&self, parts: &[&str]) -> Result<Url, IndexError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| IndexError::Url(ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty().extend(parts);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_key {
            Some(api_key) => request.header("api-key", api_key),
            None => request,
        }
    }
}

fn collection_error(collection: &str, details: impl ToString) -> IndexError {
    IndexError::Collection {
        backend: BACKEND.to_string(),
        collection: collection.to_string(),
        details: details.to_string(),
    }
}

fn write_error(collection: &str, details: impl ToString) -> IndexError {
    IndexError::Write {
        backend: BACKEND.to_string(),
        collection: collection.to_string(),
        details: details.to_string(),
    }
}

fn search_error(collection: &str, details: impl ToString) -> IndexError {
    IndexError::Search {
        backend: BACKEND.to_string(),
        collection: collection.to_string(),
        details: details.to_string(),
    }
}

async fn failure_details(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}

async fn parse_result<T: DeserializeOwned>(response: Response) -> Result<T, String> {
    response
        .json::<Envelope<T>>()
        .await
        .map(|envelope| envelope.result)
        .map_err(|error| error.to_string())
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let response = self
            .request(Method::GET, self.url(&["collections"])?)
            .send()
            .await
            .map_err(|error| collection_error("*", error))?;

        if !response.status().is_success() {
            return Err(collection_error("*", failure_details(response).await));
        }

        let listed: CollectionList = parse_result(response)
            .await
            .map_err(|error| collection_error("*", error))?;
        Ok(listed.collections.into_iter().map(|item| item.name).collect())
    }

    async fn collection_dimensions(&self, name: &str) -> Result<Option<usize>, IndexError> {
        let response = self
            .request(Method::GET, self.url(&["collections", name])?)
            .send()
            .await
            .map_err(|error| collection_error(name, error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(collection_error(name, failure_details(response).await));
        }

        let info: Value = parse_result(response)
            .await
            .map_err(|error| collection_error(name, error))?;
        info.pointer("/config/params/vectors/size")
            .and_then(Value::as_u64)
            .map(|size| Some(size as usize))
            .ok_or_else(|| collection_error(name, "collection has no single unnamed vector config"))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        let response = self
            .request(Method::PUT, self.url(&["collections", name])?)
            .json(&json!({
                "vectors": {
                    "size": dimensions,
                    "distance": distance,
                }
            }))
            .send()
            .await
            .map_err(|error| collection_error(name, error))?;

        if !response.status().is_success() {
            return Err(collection_error(name, failure_details(response).await));
        }

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        let response = self
            .request(Method::DELETE, self.url(&["collections", name])?)
            .send()
            .await
            .map_err(|error| collection_error(name, error))?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(collection_error(name, failure_details(response).await));
        }

        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<(), IndexError> {
        if points.is_empty() {
            return Ok(());
        }

        let mut url = self.url(&["collections", collection, "points"])?;
        url.query_pairs_mut().append_pair("wait", "true");

        let response = self
            .request(Method::PUT, url)
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|error| write_error(collection, error))?;

        if !response.status().is_success() {
            return Err(write_error(collection, failure_details(response).await));
        }

        debug!(collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let mut body = json!({
            "vector": vector,
            "limit": params.limit,
            "with_payload": params.with_payload,
        });
        if let Some(threshold) = params.score_threshold {
            body["score_threshold"] = json!(threshold);
        }

        let response = self
            .request(
                Method::POST,
                self.url(&["collections", collection, "points", "search"])?,
            )
            .json(&body)
            .send()
            .await
            .map_err(|error| search_error(collection, error))?;

        if !response.status().is_success() {
            return Err(search_error(collection, failure_details(response).await));
        }

        parse_result(response)
            .await
            .map_err(|error| search_error(collection, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_keep_the_base_path() {
        let store = QdrantStore::new("https://cloud.example.com/qdrant/", None).unwrap();
        let url = store.url(&["collections", "bio11", "points"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/qdrant/collections/bio11/points"
        );

        let store = QdrantStore::new("http://localhost:6333", None).unwrap();
        let url = store.url(&["collections", "bio 11"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:6333/collections/bio%2011");
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        assert!(matches!(
            QdrantStore::new("not a url", None),
            Err(IndexError::Url(_))
        ));
        assert!(matches!(
            QdrantStore::new("mailto:ops@example.com", None),
            Err(IndexError::Url(_))
        ));
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let store = QdrantStore::new("http://localhost:6333", Some("  ".to_string())).unwrap();
        assert!(store.api_key.is_none());
    }
}
