#![warn(missing_docs)]
//! Core library entry points for the docsift outline & relevance engine.
//!
//! The pipeline consumes layout-annotated text fragments produced by an
//! external PDF extractor, infers each document's heading structure, binds
//! body text to that structure, and ranks the resulting sections against a
//! persona + job-to-be-done query.

pub mod controls;
pub mod embedder;
pub mod fragment;
pub mod outline;
pub mod ranker;
pub mod report;
pub mod runtime;
pub mod scoring;
pub mod segment;

pub use controls::{EngineControls, StrategyKind};
pub use embedder::{EmbedError, Embedder, EmbeddingCache};
pub use fragment::{read_fragments, IngestReport, TextFragment};
pub use outline::{
    build_outline, FontTierHeuristic, Heading, HeadingLevel, LayoutHeuristic, Outline,
    OutlineError,
};
pub use ranker::{rank, QueryContext, RankedSection, SubsectionAnalysis};
pub use report::{DocumentStatus, IntelligenceReport, OutlineReport};
pub use runtime::{process_document, run_batch, BatchOutput, DocumentInput};
pub use segment::{segment, Section};
