mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_qa_core::{
    AnswerExtractor, CharacterNgramEmbedder, ChunkingConfig, Embedder, HttpAnswerExtractor,
    HttpEmbedder, IngestionOptions, IngestionPipeline, QdrantStore, QueryOptions, QueryPipeline,
    QueryResponse, SentenceOverlapExtractor, VectorIndex, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_PDF_PATH: &str = "data/Class-XI-Biology.pdf";

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key, sent as the `api-key` header
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "bio11")]
    collection: String,

    /// Feature-extraction endpoint. Without it a local character n-gram embedder is used.
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Bearer token for the embedding endpoint
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Vector size produced by the embedder
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Question-answering endpoint. Without it the best matching context sentence is returned.
    #[arg(long, env = "QA_URL")]
    qa_url: Option<String>,

    /// Bearer token for the question-answering endpoint
    #[arg(long, env = "QA_API_KEY", hide_env_values = true)]
    qa_api_key: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Minimum cosine similarity for a chunk to be used as context
    #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
    score_threshold: f32,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and upload a PDF into the collection.
    Ingest {
        /// PDF to ingest.
        #[arg(long, default_value = DEFAULT_PDF_PATH)]
        pdf: PathBuf,
        /// Words per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Words shared by consecutive chunks.
        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        overlap: usize,
        /// Upsert into the existing collection instead of recreating it.
        #[arg(long, default_value_t = false)]
        append: bool,
    },
    /// Answer one question and print the JSON response.
    Ask {
        /// Question to answer.
        #[arg(long)]
        question: String,
    },
    /// Serve `POST /ask` over HTTP.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind.
        #[arg(long, default_value = "8000")]
        port: u16,
    },
    /// List the collections in the index.
    Collections,
}

/// Collaborators built once per process and shared by both pipelines.
struct Services {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    answerer: Arc<dyn AnswerExtractor>,
}

impl Services {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = match &cli.embedding_url {
            Some(url) => Arc::new(
                HttpEmbedder::new(url, cli.embedding_dimensions)
                    .with_api_key(cli.embedding_api_key.clone()),
            ),
            None => {
                warn!("no embedding endpoint configured, using the local n-gram embedder");
                Arc::new(CharacterNgramEmbedder {
                    dimensions: cli.embedding_dimensions,
                })
            }
        };

        let answerer: Arc<dyn AnswerExtractor> = match &cli.qa_url {
            Some(url) => {
                Arc::new(HttpAnswerExtractor::new(url).with_api_key(cli.qa_api_key.clone()))
            }
            None => Arc::new(SentenceOverlapExtractor),
        };

        let index = QdrantStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone())
            .with_context(|| format!("invalid qdrant url {}", cli.qdrant_url))?;

        Ok(Self {
            embedder,
            index: Arc::new(index),
            answerer,
        })
    }

    fn query_pipeline(&self, cli: &Cli) -> anyhow::Result<server::SharedQueryPipeline> {
        let options = QueryOptions {
            top_k: cli.top_k,
            score_threshold: cli.score_threshold,
            ..QueryOptions::default()
        };
        Ok(QueryPipeline::new(
            self.embedder.clone(),
            self.index.clone(),
            self.answerer.clone(),
            options,
        )?)
    }
}

/// Pretty JSON for an answered query. A failed query becomes the command's
/// error so the process exits non-zero.
fn render_answer(response: &QueryResponse) -> anyhow::Result<String> {
    match response {
        QueryResponse::Answered { .. } => Ok(serde_json::to_string_pretty(response)?),
        QueryResponse::Failed { error } => Err(anyhow::anyhow!("query failed: {error}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let services = Services::from_cli(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        qdrant = %cli.qdrant_url,
        collection = %cli.collection,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    match &cli.command {
        Command::Ingest {
            pdf,
            chunk_size,
            overlap,
            append,
        } => {
            let options = IngestionOptions {
                chunking: ChunkingConfig::new(*chunk_size, *overlap)?,
                recreate: !*append,
            };
            let pipeline =
                IngestionPipeline::new(services.embedder.clone(), services.index.clone())?;
            let report = pipeline
                .ingest(pdf, &cli.collection, &options)
                .await
                .with_context(|| format!("ingesting {}", pdf.display()))?;

            println!(
                "{} chunks ingested into {} at {}",
                report.chunks_uploaded,
                report.collection,
                report.ingested_at.to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let pipeline = services.query_pipeline(&cli)?;
            let response = pipeline.answer(question, &cli.collection).await;
            println!("{}", render_answer(&response)?);
        }
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;
            let state = server::AppState::new(services.query_pipeline(&cli)?, &cli.collection);
            server::serve(state, addr).await?;
        }
        Command::Collections => {
            for name in services.index.list_collections().await? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
