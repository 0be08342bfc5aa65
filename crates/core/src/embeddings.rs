use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

/// Output size of all-MiniLM-L6-v2, the reference embedding model.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Maps text to a fixed-length vector. Chunks and questions must go through
/// the same instance, otherwise their vectors are not comparable.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts).await
    }
}

/// Hashed character-trigram embedder. Deterministic and offline, used when no
/// embedding service is configured.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector(text))
    }
}

/// Client for a feature-extraction endpoint that takes `{"inputs": text}` and
/// answers with the vector, either flat or wrapped in a one-element batch.
pub struct HttpEmbedder {
    endpoint: String,
    api_key: Option<String>,
    dimensions: usize,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, dimensions: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            dimensions,
            client: Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "inputs": text }));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbeddingError::BackendResponse(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let vector = parse_vector(&body).ok_or_else(|| {
            EmbeddingError::BackendResponse(format!(
                "{} did not return a numeric vector",
                self.endpoint
            ))
        })?;

        if vector.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}

fn parse_vector(body: &Value) -> Option<Vec<f32>> {
    let values = body.as_array()?;
    match values.first() {
        Some(Value::Array(_)) => parse_vector(values.first()?),
        _ => values
            .iter()
            .map(|value| value.as_f64().map(|number| number as f32))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Photosynthesis in higher plants").await.unwrap();
        let second = embedder.embed("Photosynthesis in higher plants").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("abc").await.unwrap();
        assert_eq!(vector.len(), 384);
        assert_eq!(embedder.dimensions(), 384);
    }

    #[tokio::test]
    async fn shared_embedder_delegates() {
        let shared: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder { dimensions: 16 });
        let batch = shared.embed_batch(&["cell wall", "cell membrane"]).await.unwrap();
        assert_eq!(shared.dimensions(), 16);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], shared.embed("cell wall").await.unwrap());
    }

    #[test]
    fn nested_and_flat_vectors_are_accepted() {
        assert_eq!(parse_vector(&json!([0.5, 1.0])), Some(vec![0.5, 1.0]));
        assert_eq!(parse_vector(&json!([[0.25, 0.75]])), Some(vec![0.25, 0.75]));
        assert_eq!(parse_vector(&json!({"error": "loading"})), None);
        assert_eq!(parse_vector(&json!(["x"])), None);
    }
}
