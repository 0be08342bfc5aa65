use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document read error: {0}")]
    DocumentRead(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid query config: {0}")]
    InvalidQueryConfig(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    AnswerExtraction(#[from] AnswerError),
}

impl QueryError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from embedding service: {0}")]
    BackendResponse(String),

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("collection {collection} request failed on {backend}: {details}")]
    Collection {
        backend: String,
        collection: String,
        details: String,
    },

    #[error("index write to {collection} failed on {backend}: {details}")]
    Write {
        backend: String,
        collection: String,
        details: String,
    },

    #[error("index search in {collection} failed on {backend}: {details}")]
    Search {
        backend: String,
        collection: String,
        details: String,
    },

    #[error("collection {collection} expects {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from answer service: {0}")]
    BackendResponse(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
