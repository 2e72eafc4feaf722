//! Batch driver: document-parallel structure extraction, pooled ranking.
//!
//! Documents share no mutable state, so outline building and segmentation fan
//! out across worker threads. The rank stage starts only after every document
//! has reported back; one document failing never aborts its siblings.

use crate::controls::EngineControls;
use crate::embedder::{Embedder, EmbeddingCache};
use crate::fragment::TextFragment;
use crate::outline::{build_outline, LayoutHeuristic, Outline, OutlineError};
use crate::ranker::{rank, QueryContext, RankedSection, SubsectionAnalysis};
use crate::report::DocumentStatus;
use crate::segment::{segment, Section};
use crossbeam_channel::{bounded, unbounded};
use std::thread;
use tracing::warn;

/// One document's fragment stream awaiting processing.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Document identifier (usually the source file stem).
    pub document_id: String,
    /// Extractor fragments in document order.
    pub fragments: Vec<TextFragment>,
}

/// Structure artifacts for one successfully processed document.
#[derive(Debug, Clone)]
pub struct DocumentArtifacts {
    /// Inferred outline.
    pub outline: Outline,
    /// Sections bound to that outline.
    pub sections: Vec<Section>,
}

/// Aggregate output of a batch run.
#[derive(Debug)]
pub struct BatchOutput {
    /// Outlines of the documents that processed cleanly, in input order.
    pub outlines: Vec<Outline>,
    /// All sections pooled across documents, ranked best-first.
    pub ranked: Vec<RankedSection>,
    /// Refined-text excerpts for the top-ranked sections.
    pub analyses: Vec<SubsectionAnalysis>,
    /// Per-document outcome, in input order.
    pub statuses: Vec<DocumentStatus>,
}

/// Runs Outline Builder + Section Segmenter for a single document.
pub fn process_document(
    input: &DocumentInput,
    heuristic: &dyn LayoutHeuristic,
) -> Result<DocumentArtifacts, OutlineError> {
    let outline = build_outline(&input.document_id, &input.fragments, heuristic)?;
    let sections = segment(&outline, &input.fragments);
    Ok(DocumentArtifacts { outline, sections })
}

/// Processes a batch of documents and ranks their pooled sections.
pub fn run_batch(
    inputs: &[DocumentInput],
    query: &QueryContext,
    embedder: Option<&dyn Embedder>,
    cache: &EmbeddingCache,
    heuristic: &(dyn LayoutHeuristic + Sync),
    controls: &EngineControls,
) -> BatchOutput {
    let outcomes = process_all(inputs, heuristic, controls.workers);

    let mut outlines = Vec::new();
    let mut pooled: Vec<Section> = Vec::new();
    let mut statuses = Vec::with_capacity(inputs.len());
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(artifacts) => {
                statuses.push(DocumentStatus::ok(input.document_id.clone()));
                outlines.push(artifacts.outline);
                pooled.extend(artifacts.sections);
            }
            Err(err) => {
                warn!(document = %input.document_id, %err, "document skipped");
                statuses.push(DocumentStatus::failed(
                    input.document_id.clone(),
                    err.to_string(),
                ));
            }
        }
    }

    let (ranked, analyses) = rank(&pooled, query, embedder, cache, controls);
    BatchOutput {
        outlines,
        ranked,
        analyses,
        statuses,
    }
}

/// Fans documents out to worker threads and joins before returning, keeping
/// results aligned with input order.
fn process_all(
    inputs: &[DocumentInput],
    heuristic: &(dyn LayoutHeuristic + Sync),
    workers: usize,
) -> Vec<Result<DocumentArtifacts, OutlineError>> {
    let workers = workers.max(1).min(inputs.len().max(1));
    if workers <= 1 {
        return inputs
            .iter()
            .map(|input| process_document(input, heuristic))
            .collect();
    }

    let (task_tx, task_rx) = bounded::<(usize, &DocumentInput)>(workers * 2);
    let (result_tx, result_rx) =
        unbounded::<(usize, Result<DocumentArtifacts, OutlineError>)>();
    let mut outcomes: Vec<Option<Result<DocumentArtifacts, OutlineError>>> =
        (0..inputs.len()).map(|_| None).collect();

    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((idx, input)) = task_rx.recv() {
                    let outcome = process_document(input, heuristic);
                    if result_tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        for task in inputs.iter().enumerate() {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        while let Ok((idx, outcome)) = result_rx.recv() {
            outcomes[idx] = Some(outcome);
        }
    });

    outcomes
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(OutlineError::EmptyDocument)))
        .collect()
}
