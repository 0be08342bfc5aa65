use crate::error::AnswerError;
use crate::models::AnswerResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Extractive question answering: the answer is a span of `context`.
#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    async fn extract(&self, context: &str, question: &str) -> Result<AnswerResult, AnswerError>;
}

#[async_trait]
impl<T: AnswerExtractor + ?Sized> AnswerExtractor for Arc<T> {
    async fn extract(&self, context: &str, question: &str) -> Result<AnswerResult, AnswerError> {
        (**self).extract(context, question).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QaResponse {
    Single(AnswerResult),
    Batch(Vec<AnswerResult>),
}

/// Client for a question-answering endpoint in the Hugging Face task shape:
/// `{"inputs": {"question", "context"}}` in, `{answer, score, start, end}` out.
pub struct HttpAnswerExtractor {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpAnswerExtractor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }
}

#[async_trait]
impl AnswerExtractor for HttpAnswerExtractor {
    async fn extract(&self, context: &str, question: &str) -> Result<AnswerResult, AnswerError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "inputs": {
                "question": question,
                "context": context,
            }
        }));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AnswerError::BackendResponse(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        match response.json::<QaResponse>().await? {
            QaResponse::Single(result) => Ok(result),
            QaResponse::Batch(results) => results.into_iter().next().ok_or_else(|| {
                AnswerError::BackendResponse(format!("{} returned no answers", self.endpoint))
            }),
        }
    }
}

const STOP_WORDS: [&str; 20] = [
    "the", "and", "what", "which", "who", "whom", "why", "how", "when", "where", "are", "was",
    "were", "does", "explain", "answer", "least", "words", "with", "for",
];

/// Offline extractor: returns the context sentence sharing the most terms
/// with the question. Score is the fraction of question terms it covers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceOverlapExtractor;

impl SentenceOverlapExtractor {
    pub fn best_span(&self, context: &str, question: &str) -> AnswerResult {
        let wanted = terms(question);
        let mut best = AnswerResult {
            answer: String::new(),
            score: 0.0,
            start: 0,
            end: 0,
        };
        let mut best_hits = 0usize;

        for (start, end) in sentence_spans(context) {
            let sentence = &context[start..end];
            let hits = terms(sentence).intersection(&wanted).count();
            if best.answer.is_empty() || hits > best_hits {
                best_hits = hits;
                best = AnswerResult {
                    answer: sentence.to_string(),
                    score: if wanted.is_empty() {
                        0.0
                    } else {
                        hits as f32 / wanted.len() as f32
                    },
                    start,
                    end,
                };
            }
        }

        best
    }
}

#[async_trait]
impl AnswerExtractor for SentenceOverlapExtractor {
    async fn extract(&self, context: &str, question: &str) -> Result<AnswerResult, AnswerError> {
        Ok(self.best_span(context, question))
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 2)
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

fn sentence_spans(context: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (index, ch) in context.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let end = index + ch.len_utf8();
            push_trimmed(context, start, end, &mut spans);
            start = end;
        }
    }
    push_trimmed(context, start, context.len(), &mut spans);
    spans
}

fn push_trimmed(context: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    let piece = &context[start..end];
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let offset = start + (piece.len() - piece.trim_start().len());
    spans.push((offset, offset + trimmed.len()));
}
