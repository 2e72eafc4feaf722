//! Engine tuning knobs shared between the library and the pipeline binaries.

use clap::ValueEnum;

/// Scoring strategy requested by the caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyKind {
    /// Embed persona+job and sections, score by cosine similarity. Degrades to
    /// the keyword strategy when the embedding backend is unavailable.
    Embedding,
    /// Pure lexical overlap against the persona+job term set.
    Keyword,
}

/// Tunable knobs that bound outline, segmentation and ranking behavior.
#[derive(Debug, Clone, Copy)]
pub struct EngineControls {
    /// Number of top-ranked sections that receive a refined-text excerpt.
    pub top_k: usize,
    /// Requested scoring strategy.
    pub strategy: StrategyKind,
    /// Sentences kept per refined-text excerpt.
    pub sentence_window: usize,
    /// Ratio band used when mapping font-size tiers to heading levels.
    pub heading_size_tolerance: f32,
    /// Minimum size ratio over the body median for non-bold heading candidates.
    pub min_heading_ratio: f32,
    /// Character cap on section text submitted to the embedding backend.
    pub max_section_chars: usize,
    /// Relative weight of the job-to-be-done embedding in the query vector.
    pub job_weight: f32,
    /// Worker threads for document processing and section scoring.
    pub workers: usize,
}

impl Default for EngineControls {
    fn default() -> Self {
        Self {
            top_k: 5,
            strategy: StrategyKind::Embedding,
            sentence_window: 4,
            heading_size_tolerance: 0.95,
            min_heading_ratio: 1.1,
            max_section_chars: 2048,
            job_weight: 1.0,
            workers: 4,
        }
    }
}
