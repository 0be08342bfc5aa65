use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pdf_qa_core::{AnswerExtractor, Embedder, QueryPipeline, QueryRequest, QueryResponse, VectorIndex};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub type SharedQueryPipeline =
    QueryPipeline<Arc<dyn Embedder>, Arc<dyn VectorIndex>, Arc<dyn AnswerExtractor>>;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<SharedQueryPipeline>,
    collection: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: SharedQueryPipeline, collection: &str) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            collection: Arc::from(collection),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, collection = %state.collection, "serving POST /ask");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "could not listen for ctrl-c");
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The body is parsed here rather than by the `Json` extractor so that every
/// rejection still answers with `{"error": ...}`. An empty body counts as a
/// missing question.
fn parse_request(body: &[u8]) -> Result<QueryRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }
    serde_json::from_slice(body).map_err(|error| format!("invalid request body: {error}"))
}

async fn ask(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<QueryResponse>) {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => {
            return (StatusCode::BAD_REQUEST, Json(QueryResponse::error(error)));
        }
    };

    match state
        .pipeline
        .try_answer(&request.question, &state.collection)
        .await
    {
        Ok(answer) => (StatusCode::OK, Json(QueryResponse::answer(answer))),
        Err(error) if error.is_invalid_input() => (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse::error(error.to_string())),
        ),
        Err(error) => {
            warn!(%error, "question could not be answered");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryResponse::error(error.to_string())),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pdf_qa_core::{
        CharacterNgramEmbedder, ChunkPayload, Distance, InMemoryIndex, IndexedPoint, QueryOptions,
        SentenceOverlapExtractor, NO_RELEVANT_CONTENT,
    };
    use tower::ServiceExt;

    const PASSAGE: &str = "Ribosomes are the sites of protein synthesis in the cell.";

    async fn state(populate: bool) -> AppState {
        let embedder = CharacterNgramEmbedder::default();
        let index = Arc::new(InMemoryIndex::new());
        if populate {
            index
                .create_collection("bio11", embedder.dimensions(), Distance::Cosine)
                .await
                .unwrap();
            index
                .upsert(
                    "bio11",
                    &[IndexedPoint {
                        id: 0,
                        vector: embedder.vector(PASSAGE),
                        payload: ChunkPayload {
                            text: PASSAGE.to_string(),
                        },
                    }],
                )
                .await
                .unwrap();
        }

        let pipeline = QueryPipeline::new(
            Arc::new(embedder) as Arc<dyn Embedder>,
            index as Arc<dyn VectorIndex>,
            Arc::new(SentenceOverlapExtractor) as Arc<dyn AnswerExtractor>,
            QueryOptions::default(),
        )
        .unwrap();
        AppState::new(pipeline, "bio11")
    }

    async fn post_ask(state: AppState, body: &'static str) -> (StatusCode, Value) {
        send(
            state,
            Request::builder()
                .method("POST")
                .uri("/ask")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_question_is_a_bad_request() {
        let (status, body) = post_ask(state(true).await, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("No question provided"));
    }

    #[tokio::test]
    async fn empty_post_is_a_missing_question() {
        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(state(true).await, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No question provided" }));
    }

    #[tokio::test]
    async fn malformed_bodies_answer_with_json_errors() {
        for payload in ["not json", r#"{"question": 5}"#, "[1, 2]"] {
            let (status, body) = post_ask(state(true).await, payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert!(
                body["error"].as_str().unwrap().starts_with("invalid request body"),
                "{payload}: {body}"
            );
        }
    }

    #[tokio::test]
    async fn question_is_read_without_a_json_content_type() {
        let request = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"question": "zzzz qqqq"}"#))
            .unwrap();

        let (status, body) = send(state(true).await, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "answer": NO_RELEVANT_CONTENT }));
    }

    #[tokio::test]
    async fn answers_from_the_collection() {
        let (status, body) = post_ask(state(true).await, r#"{"question": "Ribosomes are the sites of protein synthesis in the cell."}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "answer": PASSAGE }));
    }

    #[tokio::test]
    async fn unmatched_questions_get_the_fixed_answer() {
        let (status, body) = post_ask(state(true).await, r#"{"question": "zzzz qqqq"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "answer": NO_RELEVANT_CONTENT }));
    }

    #[tokio::test]
    async fn backend_failures_are_internal_errors() {
        let (status, body) = post_ask(state(false).await, r#"{"question": "What is a ribosome?"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("bio11"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router(state(false).await)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
