//! CBA command-line interface
//!
//! Thin layer over `cba-retrieval`: argument parsing, configuration
//! and output formatting. Every setting is a flag with an environment
//! fallback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use cba_retrieval::chunk::truncate_chars;
use cba_retrieval::config::{
    DEFAULT_ANSWER_MODEL, DEFAULT_ANSWER_TIMEOUT_SECS, DEFAULT_BASE_URL, DEFAULT_CHUNKS_FILE,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_DIR, DEFAULT_TIMEOUT_SECS,
};
use cba_retrieval::embedding::DEFAULT_BATCH_SIZE;
use cba_retrieval::{
    ingest_directory, validate_top_k, AnswerClient, AnswerConfig, ArtifactLayout, ChunkStore,
    EmbeddingConfig, IndexBuilder, RetrievalConfig, SearchEngine, SearchResult,
};

/// Characters of chunk text shown per hit in plain output
const PREVIEW_CHARS: usize = 300;

#[derive(Parser, Debug)]
#[command(name = "cba")]
#[command(about = "Build and search a Community Benefits Agreement corpus")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Paths and hosted-model settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Chunk store file
    #[arg(long, global = true, env = "CBA_CHUNKS_FILE", default_value = DEFAULT_CHUNKS_FILE)]
    pub chunks_file: PathBuf,

    /// Directory holding published index generations
    #[arg(long, global = true, env = "CBA_INDEX_DIR", default_value = DEFAULT_INDEX_DIR)]
    pub index_dir: PathBuf,

    /// API key for the embedding and completion endpoints
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL for the OpenAI-compatible API
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        global = true,
        env = "CBA_EMBEDDING_MODEL",
        default_value = DEFAULT_EMBEDDING_MODEL
    )]
    pub embedding_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, global = true, env = "CBA_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Max number of texts sent per embedding request
    #[arg(
        long,
        global = true,
        env = "CBA_EMBEDDING_BATCH",
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = parse_positive
    )]
    pub embedding_batch: usize,

    /// Total attempts per embedding request; 1 disables retries
    #[arg(
        long,
        global = true,
        env = "CBA_EMBEDDING_MAX_ATTEMPTS",
        default_value_t = 1,
        value_parser = parse_positive
    )]
    pub embedding_max_attempts: usize,

    /// Max seconds to wait for each embedding request
    #[arg(
        long,
        global = true,
        env = "CBA_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub http_timeout_secs: u64,

    /// Completion model used by `ask`
    #[arg(long, global = true, env = "CBA_ANSWER_MODEL", default_value = DEFAULT_ANSWER_MODEL)]
    pub answer_model: String,

    /// Max seconds to wait for a completion
    #[arg(
        long,
        global = true,
        env = "CBA_ANSWER_TIMEOUT_SECS",
        default_value_t = DEFAULT_ANSWER_TIMEOUT_SECS
    )]
    pub answer_timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn a directory of extracted .txt files into the chunk store
    Ingest {
        /// Directory of extracted document text
        #[arg(long)]
        input: PathBuf,
    },

    /// Embed the chunk store and publish a new index
    Build,

    /// Find the chunks closest to a query
    Search {
        query: String,

        /// Number of results (1-50)
        #[arg(long, short = 'k', default_value_t = 5, value_parser = parse_top_k)]
        top_k: usize,

        /// Print results as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Ask the hosted model a question about CBAs
    Ask { question: String },
}

fn parse_top_k(raw: &str) -> std::result::Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("`{}` is not a positive integer", raw))?;
    validate_top_k(value).map_err(|e| e.to_string())
}

fn parse_positive(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("`{}` is not a positive integer", raw)),
        Ok(value) => Ok(value),
    }
}

impl Cli {
    pub fn config(&self) -> RetrievalConfig {
        self.settings.to_config()
    }
}

impl Settings {
    pub fn to_config(&self) -> RetrievalConfig {
        let api_key = self
            .openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        RetrievalConfig {
            chunks_file: self.chunks_file.clone(),
            index_dir: self.index_dir.clone(),
            embedding: EmbeddingConfig {
                api_key: api_key.clone(),
                base_url: self.openai_base_url.clone(),
                model: self.embedding_model.clone(),
                dimensions: self.embedding_dimensions,
                timeout: Duration::from_secs(self.http_timeout_secs),
                max_attempts: self.embedding_max_attempts,
                batch_size: self.embedding_batch,
            },
            answer: AnswerConfig {
                api_key,
                base_url: self.openai_base_url.clone(),
                model: self.answer_model.clone(),
                timeout: Duration::from_secs(self.answer_timeout_secs),
            },
        }
    }
}

/// Execute one parsed command, writing its output to stdout
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    let store = ChunkStore::new(&config.chunks_file);
    let layout = ArtifactLayout::new(&config.index_dir);

    match cli.command {
        Command::Ingest { input } => {
            let report = ingest_directory(&input, &store)
                .with_context(|| format!("ingesting {}", input.display()))?;
            println!(
                "Wrote {} chunks to {} ({} of {} files skipped)",
                report.chunks_written,
                store.path().display(),
                report.files_skipped,
                report.files_seen
            );
        }
        Command::Build => {
            let engine = Arc::new(config.vector_engine()?);
            let report = IndexBuilder::new(engine, layout)
                .build_from_store(&store)
                .context("building index")?;
            println!(
                "Indexed {} chunks ({}d, {}) as {}",
                report.chunk_count, report.dimension, report.model, report.generation
            );
        }
        Command::Search { query, top_k, json } => {
            let engine = Arc::new(config.vector_engine()?);
            let results = SearchEngine::new(engine, layout).search(&query, top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No matches.");
            } else {
                print!("{}", render_results(&results));
            }
        }
        Command::Ask { question } => {
            let client = AnswerClient::new(&config.answer)?;
            tracing::debug!("Answering with {}", client.model());
            println!("{}", client.ask(&question)?);
        }
    }

    Ok(())
}

/// Plain-text rendering of search hits
pub fn render_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for hit in results {
        let chunk = &hit.chunk;
        let title = chunk.title.as_deref().unwrap_or(&chunk.doc_id);
        let pages = match (chunk.page_start, chunk.page_end) {
            (Some(start), Some(end)) if start != end => format!(" pp. {}-{}", start, end),
            (Some(start), _) => format!(" p. {}", start),
            _ => String::new(),
        };

        out.push_str("----\n");
        out.push_str(&format!(
            "#{} [{:.4}] {} ({}{})\n",
            hit.rank, hit.score, title, chunk.doc_id, pages
        ));
        out.push_str(truncate_chars(&chunk.text, PREVIEW_CHARS));
        out.push('\n');
    }
    out
}
