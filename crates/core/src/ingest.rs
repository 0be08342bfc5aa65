use crate::chunking::{build_chunks, TextNormalizer};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, IngestError};
use crate::extractor::{join_pages, LopdfExtractor, PdfExtractor};
use crate::models::{Distance, IndexedPoint, IngestionOptions, IngestionReport, TextChunk};
use crate::traits::VectorIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Normalized text of one PDF and its chunk sequence, before anything is
/// embedded or written.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub pages: usize,
    pub words: usize,
    pub checksum: String,
    pub chunks: Vec<TextChunk>,
}

pub fn text_checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// PDF → normalized text → word-window chunks → embeddings → one batch upsert.
///
/// This is the only component that writes to the index. Errors are not
/// caught: a failure aborts the run and is returned to the operator.
pub struct IngestionPipeline<E, V, X = LopdfExtractor> {
    embedder: E,
    index: V,
    extractor: X,
    normalizer: TextNormalizer,
}

impl<E, V> IngestionPipeline<E, V, LopdfExtractor>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V) -> Result<Self, IngestError> {
        Self::with_extractor(embedder, index, LopdfExtractor)
    }
}

impl<E, V, X> IngestionPipeline<E, V, X>
where
    E: Embedder,
    V: VectorIndex,
    X: PdfExtractor,
{
    pub fn with_extractor(embedder: E, index: V, extractor: X) -> Result<Self, IngestError> {
        Ok(Self {
            embedder,
            index,
            extractor,
            normalizer: TextNormalizer::new()?,
        })
    }

    pub fn prepare(
        &self,
        path: &Path,
        options: &IngestionOptions,
    ) -> Result<PreparedDocument, IngestError> {
        options.chunking.validate()?;

        let pages = self.extractor.extract_pages(path)?;
        let normalized = self.normalizer.normalize(&join_pages(&pages));
        if normalized.is_empty() {
            return Err(IngestError::DocumentRead(format!(
                "no text left after normalization: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), pages = pages.len(), "extracted pdf text");

        let chunks = build_chunks(&normalized, options.chunking)?;
        Ok(PreparedDocument {
            pages: pages.len(),
            words: normalized.split(' ').count(),
            checksum: text_checksum(&normalized),
            chunks,
        })
    }

    /// Ingests the PDF at `path` into `collection` and reports how many chunks
    /// were uploaded. With `options.recreate` the collection is dropped first.
    pub async fn ingest(
        &self,
        path: &Path,
        collection: &str,
        options: &IngestionOptions,
    ) -> Result<IngestionReport, IngestError> {
        let document = self.prepare(path, options)?;
        info!(
            chunks = document.chunks.len(),
            size = options.chunking.size,
            overlap = options.chunking.overlap,
            checksum = %document.checksum,
            "chunked document"
        );

        let vectors = self.embed_chunks(&document.chunks).await?;

        self.ensure_collection(collection, options.recreate).await?;

        let points = document
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedPoint::from_chunk(chunk, vector))
            .collect::<Vec<_>>();

        info!(collection, points = points.len(), "uploading points");
        self.index.upsert(collection, &points).await?;
        info!(collection, "upload complete");

        Ok(IngestionReport {
            collection: collection.to_string(),
            source_path: path.to_string_lossy().to_string(),
            checksum: document.checksum,
            pages: document.pages,
            words: document.words,
            chunks_uploaded: points.len(),
            recreated: options.recreate,
            ingested_at: Utc::now(),
        })
    }

    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>, IngestError> {
        info!(chunks = chunks.len(), "encoding chunks");
        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let expected = self.embedder.dimensions();
        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::BackendResponse(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            ))
            .into());
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into());
        }

        Ok(vectors)
    }

    async fn ensure_collection(&self, collection: &str, recreate: bool) -> Result<(), IngestError> {
        let dimensions = self.embedder.dimensions();

        if recreate {
            info!(collection, dimensions, "recreating collection");
            self.index
                .recreate_collection(collection, dimensions, Distance::Cosine)
                .await?;
            return Ok(());
        }

        match self.index.collection_dimensions(collection).await? {
            None => {
                info!(collection, dimensions, "creating collection");
                self.index
                    .create_collection(collection, dimensions, Distance::Cosine)
                    .await?;
            }
            Some(existing) if existing != dimensions => {
                return Err(IndexError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: existing,
                    actual: dimensions,
                }
                .into());
            }
            Some(_) => {}
        }

        Ok(())
    }
}
