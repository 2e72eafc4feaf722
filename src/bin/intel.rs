//! Round-2 pipeline: persona-conditioned document intelligence.
//!
//! Reads every fragment JSONL file in the input directory as one document,
//! ranks all sections against the persona + job-to-be-done query, and writes
//! the aggregate intelligence JSON report.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use docsift::embedder::openai::OpenAiEmbedder;
use docsift::{
    read_fragments, run_batch, DocumentInput, DocumentStatus, Embedder, EmbeddingCache,
    EngineControls, FontTierHeuristic, IntelligenceReport, QueryContext, StrategyKind,
    TextFragment,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "docsift-intel",
    about = "Rank document sections against a persona and job-to-be-done"
)]
struct IntelCli {
    /// Directory of per-document fragment JSONL files
    #[arg(long, env = "DOCSIFT_INPUT", default_value = "input")]
    input: PathBuf,

    /// Output path for the intelligence JSON report
    #[arg(long, env = "DOCSIFT_OUTPUT", default_value = "intelligence.json")]
    output: PathBuf,

    /// Persona the ranking is conditioned on
    #[arg(long, env = "DOCSIFT_PERSONA")]
    persona: Option<String>,

    /// Job to be done
    #[arg(long, env = "DOCSIFT_JOB")]
    job: Option<String>,

    /// File containing the persona text (overrides --persona)
    #[arg(long, env = "DOCSIFT_PERSONA_FILE")]
    persona_file: Option<PathBuf>,

    /// File containing the job text (overrides --job)
    #[arg(long, env = "DOCSIFT_JOB_FILE")]
    job_file: Option<PathBuf>,

    /// Scoring strategy
    #[arg(long, env = "DOCSIFT_STRATEGY", value_enum, default_value_t = StrategyKind::Embedding)]
    strategy: StrategyKind,

    /// Number of top sections receiving refined-text analysis
    #[arg(long, env = "DOCSIFT_TOP_K", default_value_t = 5)]
    top_k: usize,

    /// Sentences kept per refined-text excerpt
    #[arg(long, env = "DOCSIFT_SENTENCE_WINDOW", default_value_t = 4)]
    sentence_window: usize,

    /// Character cap on section text sent to the embedding backend
    #[arg(long, env = "DOCSIFT_MAX_SECTION_CHARS", default_value_t = 2048)]
    max_section_chars: usize,

    /// Minimum size ratio over body text for non-bold heading candidates
    #[arg(long, env = "DOCSIFT_MIN_HEADING_RATIO", default_value_t = 1.1)]
    min_heading_ratio: f32,

    /// Ratio band for grouping nearby font tiers into one heading level
    #[arg(long, env = "DOCSIFT_SIZE_TOLERANCE", default_value_t = 0.95)]
    heading_size_tolerance: f32,

    /// Worker threads for document processing and section scoring
    #[arg(long, env = "DOCSIFT_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Embedding memo cache capacity
    #[arg(long, env = "DOCSIFT_CACHE_CAPACITY", default_value_t = 4096)]
    cache_capacity: usize,

    /// OpenAI-compatible API key; without one the keyword strategy is used
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Embedding model identifier
    #[arg(
        long,
        env = "DOCSIFT_OPENAI_MODEL",
        default_value = "text-embedding-3-small"
    )]
    openai_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "DOCSIFT_OPENAI_DIMENSIONS")]
    openai_dimensions: Option<usize>,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "DOCSIFT_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    openai_base_url: String,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "DOCSIFT_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    openai_timeout_secs: u64,

    /// Number of retries for rate limits or transient errors
    #[arg(long, env = "DOCSIFT_OPENAI_MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = IntelCli::parse();

    let query = QueryContext::new(
        resolve_text(cli.persona_file.as_deref(), cli.persona.as_deref(), "persona")?,
        resolve_text(cli.job_file.as_deref(), cli.job.as_deref(), "job")?,
    );
    let controls = EngineControls {
        top_k: cli.top_k.max(1),
        strategy: cli.strategy,
        sentence_window: cli.sentence_window.max(1),
        heading_size_tolerance: cli.heading_size_tolerance,
        min_heading_ratio: cli.min_heading_ratio,
        max_section_chars: cli.max_section_chars.max(1),
        workers: cli.workers.max(1),
        ..EngineControls::default()
    };
    let heuristic = FontTierHeuristic::from_controls(&controls);
    let cache = EmbeddingCache::new(cli.cache_capacity);
    let embedder = build_embedder(&cli)?;

    let (inputs, load_failures) = load_documents(&cli.input)?;
    anyhow::ensure!(
        !inputs.is_empty() || !load_failures.is_empty(),
        "no .jsonl inputs found in {:?}",
        cli.input
    );
    let mut documents: Vec<String> = inputs.iter().map(|d| d.document_id.clone()).collect();
    documents.extend(load_failures.iter().map(|s| s.document.clone()));

    let output = run_batch(
        &inputs,
        &query,
        embedder.as_ref().map(|e| e as &dyn Embedder),
        &cache,
        &heuristic,
        &controls,
    );
    let mut statuses = output.statuses;
    statuses.extend(load_failures);

    let report = IntelligenceReport::assemble(
        documents,
        &query,
        &output.ranked,
        &output.analyses,
        statuses,
    );
    let file = File::create(&cli.output)
        .with_context(|| format!("failed to create {:?}", cli.output))?;
    serde_json::to_writer_pretty(file, &report).context("failed to write intelligence JSON")?;

    eprintln!(
        "ranked {} section(s) across {} document(s) -> {:?}",
        report.extracted_sections.len(),
        report.metadata.documents.len(),
        cli.output
    );
    Ok(())
}

/// File contents win over the inline flag, matching how persona/job briefs
/// are usually distributed alongside the document set.
fn resolve_text(file: Option<&Path>, inline: Option<&str>, what: &str) -> Result<String> {
    if let Some(path) = file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {what} file {:?}", path))?;
        return Ok(text.trim().to_string());
    }
    inline
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .with_context(|| format!("missing {what}: pass --{what} or --{what}-file"))
}

fn build_embedder(cli: &IntelCli) -> Result<Option<OpenAiEmbedder>> {
    if cli.strategy != StrategyKind::Embedding {
        return Ok(None);
    }
    let Some(api_key) = cli.openai_api_key.clone().filter(|k| !k.trim().is_empty()) else {
        // The ranker logs the fallback; nothing to construct here.
        return Ok(None);
    };
    let embedder = OpenAiEmbedder::new(
        api_key,
        cli.openai_base_url.clone(),
        cli.openai_model.clone(),
        cli.openai_dimensions,
        Duration::from_secs(cli.openai_timeout_secs.max(1)),
        cli.max_retries.max(1),
    )
    .context("failed to build embedding client")?;
    Ok(Some(embedder))
}

/// Loads every fragment file in the directory. An unreadable document becomes
/// a failed status entry rather than aborting the batch; only a failure to
/// list the directory itself is fatal.
fn load_documents(input: &Path) -> Result<(Vec<DocumentInput>, Vec<DocumentStatus>)> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(input)
        .with_context(|| format!("failed to read input directory {:?}", input))?
    {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut inputs = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        let document_id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("document")
            .to_string();
        match load_one(&path) {
            Ok(fragments) => inputs.push(DocumentInput {
                document_id,
                fragments,
            }),
            Err(err) => {
                eprintln!("{document_id}: skipped ({err:#})");
                failures.push(DocumentStatus::failed(document_id, format!("{err:#}")));
            }
        }
    }
    Ok((inputs, failures))
}

fn load_one(path: &Path) -> Result<Vec<TextFragment>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let ingest = read_fragments(BufReader::new(file))
        .with_context(|| format!("failed to read fragments from {:?}", path))?;
    Ok(ingest.fragments)
}
