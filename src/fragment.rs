//! Text-fragment ingestion for layout-extractor output streams.
//!
//! The engine never touches PDF bytes. An external extractor emits one JSON
//! record per text run, annotated with font size, weight and position; this
//! module turns those line streams into ordered, validated fragment vectors.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::BufRead;
use tracing::warn;

/// One extractor-emitted run of text with its layout annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    /// Visible text content, whitespace-collapsed.
    pub text: String,
    /// Font size in points.
    pub font_size: f32,
    /// Whether the extractor flagged the font as bold.
    pub is_bold: bool,
    /// Horizontal origin of the fragment on its page.
    pub x: f32,
    /// Vertical origin of the fragment on its page (grows downward).
    pub y: f32,
    /// 1-based page number.
    pub page: u32,
}

/// Ingestion result: surviving fragments plus a malformed-record count.
#[derive(Debug)]
pub struct IngestReport {
    /// Fragments that passed validation, in document order.
    pub fragments: Vec<TextFragment>,
    /// Records dropped for missing layout attributes or unparseable JSON.
    pub dropped: usize,
}

/// Errors surfaced while reading a fragment stream.
#[derive(Debug)]
pub enum FragmentError {
    /// The underlying reader failed.
    Io(std::io::Error),
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read fragment stream: {err}"),
        }
    }
}

impl std::error::Error for FragmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for FragmentError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Loosely-typed record used to tolerate partially populated extractor output.
#[derive(Debug, Deserialize)]
struct RawFragment {
    text: Option<String>,
    font_size: Option<f32>,
    #[serde(default)]
    is_bold: Option<bool>,
    x: Option<f32>,
    y: Option<f32>,
    page: Option<u32>,
}

impl RawFragment {
    /// Promotes the record to a [`TextFragment`], or `None` when a required
    /// layout attribute is absent. Missing boldness defaults to false since
    /// several extractors only report it for styled runs.
    fn validate(self) -> Option<TextFragment> {
        let text = collapse_whitespace(self.text?.as_str());
        if text.is_empty() {
            return None;
        }
        Some(TextFragment {
            text,
            font_size: self.font_size?,
            is_bold: self.is_bold.unwrap_or(false),
            x: self.x?,
            y: self.y?,
            page: self.page?,
        })
    }
}

/// Reads a JSONL fragment stream, dropping malformed records.
///
/// A record missing any required layout attribute is counted and skipped; the
/// document keeps processing even when an entire page is malformed. Only a
/// failing reader aborts ingestion.
pub fn read_fragments<R: BufRead>(reader: R) -> Result<IngestReport, FragmentError> {
    let mut fragments = Vec::new();
    let mut dropped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawFragment>(&line) {
            Ok(raw) => match raw.validate() {
                Some(fragment) => fragments.push(fragment),
                None => dropped += 1,
            },
            Err(err) => {
                warn!(line = line_no + 1, %err, "dropping unparseable fragment record");
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!(dropped, kept = fragments.len(), "dropped malformed fragments");
    }
    sort_document_order(&mut fragments);
    Ok(IngestReport { fragments, dropped })
}

/// Sorts fragments into reading order: page, then vertical, then horizontal.
pub fn sort_document_order(fragments: &mut [TextFragment]) {
    fragments.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });
}

/// Collapses whitespace runs to single spaces without touching any other
/// codepoints. Non-Latin scripts pass through exactly.
pub(crate) fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}
