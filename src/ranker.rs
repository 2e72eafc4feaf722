//! Persona-conditioned section ranking and extractive refinement.
//!
//! Both scoring strategies live behind the [`QueryModel`] tagged variant so
//! the embedding-unavailable fallback is a single decision point rather than
//! branching scattered through the ranker. Scoring is parallel and pure per
//! section; ranks are assigned only after every score is present.

use crate::controls::{EngineControls, StrategyKind};
use crate::embedder::{EmbedError, Embedder, EmbeddingCache};
use crate::scoring::{combine_query, cosine_similarity, split_sentences, TermSet};
use crate::segment::Section;
use crossbeam_channel::{bounded, unbounded};
use std::cmp::Ordering;
use std::thread;
use tracing::warn;

/// The information need a ranking run is conditioned on.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Who is asking.
    pub persona: String,
    /// What they are trying to get done.
    pub job: String,
}

impl QueryContext {
    /// Builds a query context from persona and job strings.
    pub fn new(persona: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            job: job.into(),
        }
    }

    /// Persona and job joined for lexical matching.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.persona, self.job)
    }
}

/// A section plus its relevance score and 1-based importance rank.
#[derive(Debug, Clone)]
pub struct RankedSection {
    /// The scored section.
    pub section: Section,
    /// Similarity score under the active strategy.
    pub score: f32,
    /// Dense rank across all pooled sections, 1 = most relevant.
    pub importance_rank: usize,
}

/// Extractive excerpt for one top-ranked section.
#[derive(Debug, Clone)]
pub struct SubsectionAnalysis {
    /// Identifier of the owning document.
    pub document_id: String,
    /// Page the parent section starts on.
    pub page: u32,
    /// Top sentences of the section, in their original order.
    pub refined_text: String,
}

/// Resolved scoring strategy for one run.
///
/// Built once per run from the [`QueryContext`]; every section and sentence
/// score goes through the same variant so scores stay mutually comparable.
enum QueryModel<'a> {
    Embedding {
        query: Vec<f32>,
        embedder: &'a dyn Embedder,
        cache: &'a EmbeddingCache,
        max_chars: usize,
    },
    Keyword {
        terms: TermSet,
    },
}

impl<'a> QueryModel<'a> {
    fn keyword(query: &QueryContext) -> Self {
        Self::Keyword {
            terms: TermSet::new(&query.combined_text()),
        }
    }

    fn embedding(
        query: &QueryContext,
        embedder: &'a dyn Embedder,
        cache: &'a EmbeddingCache,
        controls: &EngineControls,
    ) -> Result<Self, EmbedError> {
        let persona = cache.get_or_embed(embedder, &query.persona)?;
        let job = cache.get_or_embed(embedder, &query.job)?;
        Ok(Self::Embedding {
            query: combine_query(&persona, &job, controls.job_weight),
            embedder,
            cache,
            max_chars: controls.max_section_chars,
        })
    }

    /// Scores one text span against the query.
    fn score_text(&self, text: &str) -> Result<f32, EmbedError> {
        match self {
            Self::Embedding {
                query,
                embedder,
                cache,
                max_chars,
            } => {
                let capped = cap_chars(text, *max_chars);
                let vector = cache.get_or_embed(*embedder, capped)?;
                Ok(cosine_similarity(&vector, query))
            }
            Self::Keyword { terms } => Ok(terms.score(text)),
        }
    }

    fn score_section(&self, section: &Section) -> Result<f32, EmbedError> {
        match self {
            Self::Embedding {
                query,
                embedder,
                cache,
                max_chars,
            } => {
                // The cap bounds the body text alone; the heading is always
                // prepended in full.
                let body = cap_chars(&section.text, *max_chars);
                let text = format!("{} {body}", section.heading.text);
                let vector = cache.get_or_embed(*embedder, &text)?;
                Ok(cosine_similarity(&vector, query))
            }
            Self::Keyword { terms } => {
                Ok(terms.score(&format!("{} {}", section.heading.text, section.text)))
            }
        }
    }
}

fn cap_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ranks pooled sections against a persona+job query.
///
/// Returns the full ranked list plus a refined-text analysis for the top
/// `top_k` sections. Never fails: an unavailable embedding backend degrades
/// the whole run to the keyword strategy, and an empty section list returns
/// empty results.
pub fn rank(
    sections: &[Section],
    query: &QueryContext,
    embedder: Option<&dyn Embedder>,
    cache: &EmbeddingCache,
    controls: &EngineControls,
) -> (Vec<RankedSection>, Vec<SubsectionAnalysis>) {
    if sections.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut model = resolve_model(query, embedder, cache, controls);
    let scores = match score_all(&model, sections, controls.workers) {
        Ok(scores) => scores,
        Err(err) => {
            warn!(%err, "embedding backend went away mid-run, rescoring with keyword strategy");
            model = QueryModel::keyword(query);
            score_all(&model, sections, controls.workers)
                .expect("keyword scoring cannot fail")
        }
    };

    // All scores are present past this point; sort and assign ranks in one
    // single-threaded pass. Ties break on pooled section order, which encodes
    // (document order, section order), so reruns are byte-identical.
    let mut order: Vec<usize> = (0..sections.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let ranked: Vec<RankedSection> = order
        .iter()
        .enumerate()
        .map(|(rank, &idx)| RankedSection {
            section: sections[idx].clone(),
            score: scores[idx],
            importance_rank: rank + 1,
        })
        .collect();

    let analyses = ranked
        .iter()
        .take(controls.top_k)
        .map(|entry| SubsectionAnalysis {
            document_id: entry.section.document_id.clone(),
            page: entry.section.page,
            refined_text: refine(&entry.section, &model, query, controls.sentence_window),
        })
        .collect();

    (ranked, analyses)
}

/// The one place the fallback policy lives.
fn resolve_model<'a>(
    query: &QueryContext,
    embedder: Option<&'a dyn Embedder>,
    cache: &'a EmbeddingCache,
    controls: &EngineControls,
) -> QueryModel<'a> {
    match (controls.strategy, embedder) {
        (StrategyKind::Keyword, _) => QueryModel::keyword(query),
        (StrategyKind::Embedding, None) => {
            warn!("no embedding backend configured, using keyword strategy");
            QueryModel::keyword(query)
        }
        (StrategyKind::Embedding, Some(embedder)) => {
            match QueryModel::embedding(query, embedder, cache, controls) {
                Ok(model) => model,
                Err(err) => {
                    warn!(%err, "query embedding failed, using keyword strategy");
                    QueryModel::keyword(query)
                }
            }
        }
    }
}

/// Scores every section, fanning out across worker threads. Acts as the join
/// barrier: returns only once all sections have a score, or the first
/// embedding failure once the workers drain.
fn score_all(
    model: &QueryModel<'_>,
    sections: &[Section],
    workers: usize,
) -> Result<Vec<f32>, EmbedError> {
    let workers = workers.max(1).min(sections.len());
    if workers <= 1 {
        return sections
            .iter()
            .map(|section| model.score_section(section))
            .collect();
    }

    let (task_tx, task_rx) = bounded::<(usize, &Section)>(workers * 2);
    let (result_tx, result_rx) = unbounded::<(usize, Result<f32, EmbedError>)>();
    let mut scores = vec![0.0f32; sections.len()];
    let mut first_err: Option<EmbedError> = None;

    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((idx, section)) = task_rx.recv() {
                    let outcome = model.score_section(section);
                    if result_tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        for task in sections.iter().enumerate() {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        while let Ok((idx, outcome)) = result_rx.recv() {
            match outcome {
                Ok(score) => scores[idx] = score,
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
    });

    match first_err {
        Some(err) => Err(err),
        None => Ok(scores),
    }
}

/// Builds the refined-text excerpt for one section: score each sentence with
/// the active strategy, keep the top `window`, emit them in original order.
fn refine(
    section: &Section,
    model: &QueryModel<'_>,
    query: &QueryContext,
    window: usize,
) -> String {
    match refine_with(section, model, window) {
        Ok(text) => text,
        Err(err) => {
            // Backend died between section scoring and refinement; sentence
            // selection degrades to keyword matching for this excerpt.
            warn!(%err, "sentence scoring fell back to keyword strategy");
            refine_with(section, &QueryModel::keyword(query), window)
                .expect("keyword scoring cannot fail")
        }
    }
}

fn refine_with(
    section: &Section,
    model: &QueryModel<'_>,
    window: usize,
) -> Result<String, EmbedError> {
    let sentences = split_sentences(&section.text);
    if sentences.is_empty() || window == 0 {
        return Ok(String::new());
    }
    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(sentences.len());
    for (idx, sentence) in sentences.iter().enumerate() {
        scored.push((idx, model.score_text(sentence)?));
    }
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let mut selected: Vec<usize> = scored.iter().take(window).map(|&(idx, _)| idx).collect();
    // Readability over score order: re-emit in document order.
    selected.sort_unstable();
    Ok(selected
        .into_iter()
        .map(|idx| sentences[idx])
        .collect::<Vec<_>>()
        .join(" "))
}
