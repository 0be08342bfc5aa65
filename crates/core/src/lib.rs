pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use answer::{AnswerExtractor, HttpAnswerExtractor, SentenceOverlapExtractor};
pub use chunking::{
    build_chunks, chunk_words, normalize_text, ChunkingConfig, TextNormalizer,
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
pub use embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AnswerError, EmbeddingError, IndexError, IngestError, QueryError};
pub use extractor::{join_pages, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{text_checksum, IngestionPipeline, PreparedDocument};
pub use models::{
    AnswerResult, ChunkPayload, Distance, IndexedPoint, IngestionOptions, IngestionReport,
    PointId, QueryOptions, QueryRequest, QueryResponse, RetrievedContext, ScoredPoint,
    SearchParams, TextChunk, DEFAULT_INSTRUCTION_SUFFIX, DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K,
    NO_RELEVANT_CONTENT,
};
pub use orchestrator::{assemble_context, shape_question, QueryPipeline};
pub use stores::{InMemoryIndex, QdrantStore};
pub use traits::VectorIndex;
