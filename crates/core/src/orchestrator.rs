use crate::answer::AnswerExtractor;
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, QueryError};
use crate::models::{QueryOptions, QueryResponse, RetrievedContext, ScoredPoint, NO_RELEVANT_CONTENT};
use crate::traits::VectorIndex;
use tracing::{debug, info, warn};

/// Question → embedding → similarity search → context → extractive answer.
///
/// Read-only: nothing is written to the index. The embedder must be the one
/// the collection was ingested with.
pub struct QueryPipeline<E, V, A> {
    embedder: E,
    index: V,
    answerer: A,
    options: QueryOptions,
}

impl<E, V, A> QueryPipeline<E, V, A>
where
    E: Embedder,
    V: VectorIndex,
    A: AnswerExtractor,
{
    pub fn new(embedder: E, index: V, answerer: A, options: QueryOptions) -> Result<Self, QueryError> {
        options.validate()?;

        Ok(Self {
            embedder,
            index,
            answerer,
            options,
        })
    }

    pub async fn retrieve(
        &self,
        question: &str,
        collection: &str,
    ) -> Result<RetrievedContext, QueryError> {
        let question = validate_question(question)?;

        let vector = self.embedder.embed(question).await?;
        if vector.len() != self.embedder.dimensions() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                actual: vector.len(),
            }
            .into());
        }

        let hits = self
            .index
            .search(collection, &vector, self.options.search_params())
            .await?;

        let context = assemble_context(&hits);
        info!(
            collection,
            hits = hits.len(),
            chunks = context.chunks.len(),
            "retrieved context"
        );
        for chunk in &context.chunks {
            debug!(chunk = %chunk, "context chunk");
        }

        Ok(context)
    }

    /// Answers `question` from `collection`, returning errors as-is.
    pub async fn try_answer(&self, question: &str, collection: &str) -> Result<String, QueryError> {
        let context = self.retrieve(question, collection).await?;
        if context.is_empty() {
            return Ok(NO_RELEVANT_CONTENT.to_string());
        }

        let shaped = shape_question(question, &self.options.instruction_suffix);
        let result = self.answerer.extract(&context.text(), &shaped).await?;
        debug!(score = result.score, start = result.start, end = result.end, "extracted answer");

        Ok(result.answer)
    }

    /// Caller-facing variant of [`try_answer`](Self::try_answer): every error
    /// becomes `{"error": message}`.
    pub async fn answer(&self, question: &str, collection: &str) -> QueryResponse {
        match self.try_answer(question, collection).await {
            Ok(answer) => QueryResponse::answer(answer),
            Err(error) => {
                warn!(%error, "query failed");
                QueryResponse::error(error.to_string())
            }
        }
    }
}

fn validate_question(question: &str) -> Result<&str, QueryError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(QueryError::InvalidInput("No question provided".to_string()));
    }
    Ok(trimmed)
}

/// Keeps the `text` of every hit that has one, best score first.
pub fn assemble_context(hits: &[ScoredPoint]) -> RetrievedContext {
    let mut ranked = hits.iter().collect::<Vec<_>>();
    ranked.sort_by(|left, right| right.score.total_cmp(&left.score));

    RetrievedContext {
        chunks: ranked
            .into_iter()
            .filter_map(ScoredPoint::text)
            .map(str::to_string)
            .collect(),
    }
}

pub fn shape_question(question: &str, suffix: &str) -> String {
    let question = question.trim();
    if suffix.trim().is_empty() {
        question.to_string()
    } else {
        format!("{question}. {}", suffix.trim())
    }
}
