//! Round-1 pipeline: per-document outline extraction.
//!
//! Reads one fragment JSONL file per document from the input directory and
//! writes one outline JSON per document to the output directory.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use docsift::{build_outline, read_fragments, EngineControls, FontTierHeuristic, OutlineReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "docsift-outliner",
    about = "Extract hierarchical outlines from fragment JSONL streams"
)]
struct OutlinerCli {
    /// Directory of per-document fragment JSONL files (or a single file)
    #[arg(long, env = "DOCSIFT_INPUT", default_value = "input")]
    input: PathBuf,

    /// Output directory for per-document outline JSON
    #[arg(long, env = "DOCSIFT_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Minimum size ratio over body text for non-bold heading candidates
    #[arg(long, env = "DOCSIFT_MIN_HEADING_RATIO", default_value_t = 1.1)]
    min_heading_ratio: f32,

    /// Ratio band for grouping nearby font tiers into one heading level
    #[arg(long, env = "DOCSIFT_SIZE_TOLERANCE", default_value_t = 0.95)]
    heading_size_tolerance: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = OutlinerCli::parse();

    let controls = EngineControls {
        min_heading_ratio: cli.min_heading_ratio,
        heading_size_tolerance: cli.heading_size_tolerance,
        ..EngineControls::default()
    };
    let heuristic = FontTierHeuristic::from_controls(&controls);

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;

    let inputs = collect_inputs(&cli.input)?;
    anyhow::ensure!(!inputs.is_empty(), "no .jsonl inputs found in {:?}", cli.input);

    let mut failed = 0usize;
    for path in &inputs {
        let document_id = document_id(path);
        match extract_one(path, &document_id, &heuristic) {
            Ok(report) => {
                let out_path = cli.output.join(format!("{document_id}.json"));
                write_report(&report, &out_path)?;
                eprintln!(
                    "{document_id}: title + {} headings -> {:?}",
                    report.outline.len(),
                    out_path
                );
            }
            // One bad document never aborts the batch.
            Err(err) => {
                failed += 1;
                eprintln!("{document_id}: skipped ({err:#})");
            }
        }
    }
    eprintln!("processed {} document(s), {failed} failed", inputs.len());
    Ok(())
}

fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
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
    Ok(paths)
}

fn document_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_string()
}

fn extract_one(
    path: &Path,
    document_id: &str,
    heuristic: &FontTierHeuristic,
) -> Result<OutlineReport> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let ingest = read_fragments(BufReader::new(file))?;
    let outline = build_outline(document_id, &ingest.fragments, heuristic)?;
    Ok(OutlineReport::from_outline(&outline))
}

fn write_report(report: &OutlineReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, report).context("failed to write outline JSON")?;
    Ok(())
}
