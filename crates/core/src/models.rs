use crate::chunking::ChunkingConfig;
use crate::error::QueryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_INSTRUCTION_SUFFIX: &str = "Explain the answer in at least 100 words.";
pub const NO_RELEVANT_CONTENT: &str = "No relevant content found in document.";

/// A word window cut from the normalized document text. `id` is the window's
/// position in the chunk sequence and doubles as the point id in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
}

/// The unit stored in a collection. Serializes to the point shape the Qdrant
/// REST API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl IndexedPoint {
    pub fn from_chunk(chunk: &TextChunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            vector,
            payload: ChunkPayload {
                text: chunk.text.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(id) => write!(f, "{id}"),
            Self::Uuid(id) => f.write_str(id),
        }
    }
}

/// One search hit. The payload is kept loosely typed: points written by other
/// tools may not carry a `text` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

impl ScoredPoint {
    pub fn text(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.get("text"))
            .and_then(Value::as_str)
    }
}

/// Similarity metric of a collection. Chunks are always compared by cosine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub limit: usize,
    pub score_threshold: Option<f32>,
    pub with_payload: bool,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunking: ChunkingConfig,
    /// Drop and recreate the collection before uploading. When false the
    /// collection is created only if absent and points are upserted over it.
    pub recreate: bool,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            recreate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub collection: String,
    pub source_path: String,
    pub checksum: String,
    pub pages: usize,
    pub words: usize,
    pub chunks_uploaded: usize,
    pub recreated: bool,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub top_k: usize,
    pub score_threshold: f32,
    /// Appended to the question before it reaches the answer extractor.
    pub instruction_suffix: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            instruction_suffix: DEFAULT_INSTRUCTION_SUFFIX.to_string(),
        }
    }
}

impl QueryOptions {
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.top_k == 0 {
            return Err(QueryError::InvalidQueryConfig(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.score_threshold) {
            return Err(QueryError::InvalidQueryConfig(format!(
                "score threshold {} is outside [-1, 1]",
                self.score_threshold
            )));
        }
        Ok(())
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            limit: self.top_k,
            score_threshold: Some(self.score_threshold),
            with_payload: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
}

/// Chunk texts returned by a search, in descending similarity order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub chunks: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.is_empty())
    }

    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .filter(|chunk| !chunk.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// What the caller of the query pipeline sees: `{"answer": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Answered { answer: String },
    Failed { error: String },
}

impl QueryResponse {
    pub fn answer(answer: impl Into<String>) -> Self {
        Self::Answered {
            answer: answer.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }
}
