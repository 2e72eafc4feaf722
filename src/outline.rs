//! Outline inference from typographic and positional signals.
//!
//! No byte-level layout analysis happens here: the heuristic works purely on
//! font-size tiers, boldness and line position of extracted fragments. Tier
//! classification sits behind [`LayoutHeuristic`] so an alternative layout
//! classifier can be swapped in without touching the segmenter or ranker.

use crate::fragment::{collapse_whitespace, TextFragment};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Structural rank of a heading.
///
/// Ordering follows document hierarchy: `Title` outranks `H1`, which outranks
/// `H2`, and so on. Serialized as the bare variant name (`"H1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    /// Document title; never emitted in the outline sequence.
    Title,
    /// Top-level heading.
    H1,
    /// Second-level heading.
    H2,
    /// Third-level heading. Tiers deeper than three clamp here.
    H3,
}

/// One detected heading with its page anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Merged heading text.
    pub text: String,
    /// Assigned structural level.
    pub level: HeadingLevel,
    /// 1-based page the heading starts on.
    pub page: u32,
}

/// Ordered title + heading hierarchy for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outline {
    /// Identifier of the source document (usually the file stem).
    pub document_id: String,
    /// Document title.
    pub title: String,
    /// Headings in document order, `Title` excluded.
    pub headings: Vec<Heading>,
}

/// Errors surfaced while building an outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// The fragment stream contained no extractable text.
    EmptyDocument,
}

impl fmt::Display for OutlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDocument => write!(f, "document has no extractable text"),
        }
    }
}

impl std::error::Error for OutlineError {}

/// Title and headings produced by a layout classifier.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedLayout {
    /// Title candidate, when the classifier found one.
    pub title: Option<String>,
    /// Headings in document order.
    pub headings: Vec<Heading>,
}

/// Pluggable layout classification strategy.
///
/// Implementations must emit headings in `(page, y)` document order and leave
/// the title out of the heading sequence.
pub trait LayoutHeuristic {
    /// Classifies an ordered fragment stream into a title and headings.
    fn classify(&self, fragments: &[TextFragment]) -> ClassifiedLayout;
}

/// Builds the outline for one document.
///
/// Fails only when the stream is empty; a document with uniform typography
/// yields a title and an empty heading list.
pub fn build_outline(
    document_id: &str,
    fragments: &[TextFragment],
    heuristic: &dyn LayoutHeuristic,
) -> Result<Outline, OutlineError> {
    if fragments.is_empty() {
        return Err(OutlineError::EmptyDocument);
    }
    let layout = heuristic.classify(fragments);
    let title = layout
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| fallback_title(fragments));

    let mut seen: HashSet<(HeadingLevel, String, u32)> = HashSet::new();
    let mut headings = Vec::with_capacity(layout.headings.len());
    for heading in layout.headings {
        let text = collapse_whitespace(&heading.text);
        if text.is_empty() {
            continue;
        }
        if seen.insert((heading.level, text.clone(), heading.page)) {
            headings.push(Heading {
                text,
                level: heading.level,
                page: heading.page,
            });
        }
    }

    Ok(Outline {
        document_id: document_id.to_string(),
        title,
        headings,
    })
}

/// First non-empty line of the first page, used when no title tier qualifies.
fn fallback_title(fragments: &[TextFragment]) -> String {
    let first_page = fragments.iter().map(|f| f.page).min().unwrap_or(1);
    fragments
        .iter()
        .find(|f| f.page == first_page && !f.text.trim().is_empty())
        .or_else(|| fragments.first())
        .map(|f| f.text.clone())
        .unwrap_or_default()
}

/// Font-size-tier layout classifier.
///
/// Distinct sizes above the body-text median form the heading tiers. The
/// largest tier becomes the title tier when it only occurs near the top of the
/// first page; the next tiers map to H1/H2/H3, clamping deeper tiers to H3.
#[derive(Debug, Clone, Copy)]
pub struct FontTierHeuristic {
    /// Minimum size ratio over the body median for non-bold candidates.
    pub min_heading_ratio: f32,
    /// Ratio band for grouping nearby tiers into one heading level.
    pub size_tolerance: f32,
    /// Vertical tolerance (same units as fragment `y`) for same-line grouping.
    pub line_tolerance: f32,
    /// Fraction of pages a short line must repeat on to count as furniture.
    pub furniture_page_fraction: f32,
    /// Fraction of the first page's vertical extent considered "near the top"
    /// when qualifying the title tier.
    pub title_zone_fraction: f32,
}

impl Default for FontTierHeuristic {
    fn default() -> Self {
        Self {
            min_heading_ratio: 1.1,
            size_tolerance: 0.95,
            line_tolerance: 2.0,
            furniture_page_fraction: 0.6,
            title_zone_fraction: 0.25,
        }
    }
}

impl FontTierHeuristic {
    /// Builds a heuristic with a custom non-bold size ratio.
    pub fn with_min_ratio(min_heading_ratio: f32) -> Self {
        Self {
            min_heading_ratio,
            ..Self::default()
        }
    }

    /// Builds a heuristic from the shared engine controls.
    pub fn from_controls(controls: &crate::controls::EngineControls) -> Self {
        Self {
            min_heading_ratio: controls.min_heading_ratio,
            size_tolerance: controls.heading_size_tolerance,
            ..Self::default()
        }
    }
}

/// Half-point bucket key so float jitter from extractors groups into one tier.
fn size_key(size: f32) -> i32 {
    (size * 2.0).round() as i32
}

impl LayoutHeuristic for FontTierHeuristic {
    fn classify(&self, fragments: &[TextFragment]) -> ClassifiedLayout {
        if fragments.is_empty() {
            return ClassifiedLayout::default();
        }

        let median = body_median(fragments);
        let furniture = furniture_texts(fragments, self.furniture_page_fraction);
        let lines = LineIndex::build(fragments, self.line_tolerance);

        // Distinct size tiers above the body median, largest first.
        let mut tier_keys: Vec<i32> = fragments
            .iter()
            .map(|f| size_key(f.font_size))
            .filter(|&key| key > size_key(median))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tier_keys.sort_unstable_by(|a, b| b.cmp(a));

        let title_key = tier_keys
            .first()
            .copied()
            .filter(|&key| self.is_title_tier(fragments, key));
        let heading_keys: Vec<i32> = tier_keys
            .iter()
            .copied()
            .filter(|&key| Some(key) != title_key)
            .collect();
        debug!(
            body_median = median,
            tiers = tier_keys.len(),
            title_tier = title_key.is_some(),
            "classified font tiers"
        );

        // Nearby tiers collapse into one level band; anything below the third
        // band clamps to H3.
        let mut levels: HashMap<i32, HeadingLevel> = HashMap::new();
        let mut current = HeadingLevel::H1;
        let mut band_anchor: Option<f32> = None;
        for &key in &heading_keys {
            let size = key as f32 / 2.0;
            if let Some(anchor) = band_anchor {
                if size < anchor * self.size_tolerance {
                    current = match current {
                        HeadingLevel::H1 => HeadingLevel::H2,
                        _ => HeadingLevel::H3,
                    };
                    band_anchor = Some(size);
                }
            } else {
                band_anchor = Some(size);
            }
            levels.insert(key, current);
        }

        let mut merger = HeadingMerger::new();
        let mut title: Option<String> = None;
        for (idx, fragment) in fragments.iter().enumerate() {
            let key = size_key(fragment.font_size);
            let in_title_tier = Some(key) == title_key;
            let level = levels.get(&key).copied();
            if !in_title_tier && level.is_none() {
                merger.interrupt();
                continue;
            }
            if !self.is_candidate(fragment, median, &lines) || furniture.contains(&fragment.text) {
                // Emphasized body phrases stay body text even inside a tier.
                merger.interrupt();
                continue;
            }
            if in_title_tier {
                if fragment.page == first_page(fragments) && title.is_none() {
                    title = Some(merge_title(fragments, idx, key));
                }
                merger.interrupt();
                continue;
            }
            let level = level.expect("non-title candidates carry a level");
            merger.push(idx, fragment, key, level);
        }

        if title.is_none() {
            // No qualifying title tier: first non-furniture line of page one.
            let first = first_page(fragments);
            title = fragments
                .iter()
                .find(|f| f.page == first && !furniture.contains(&f.text))
                .map(|f| f.text.clone());
        }

        ClassifiedLayout {
            title,
            headings: merger.finish(),
        }
    }
}

impl FontTierHeuristic {
    /// A tier is the title tier when every occurrence sits near the top of the
    /// first page; a tier reappearing further down or on later pages is a
    /// heading tier.
    fn is_title_tier(&self, fragments: &[TextFragment], key: i32) -> bool {
        let first = first_page(fragments);
        let page_one: Vec<&TextFragment> = fragments.iter().filter(|f| f.page == first).collect();
        let Some(min_y) = page_one.iter().map(|f| f.y).fold(None, fold_min) else {
            return false;
        };
        let max_y = page_one.iter().map(|f| f.y).fold(min_y, f32::max);
        let cutoff = min_y + (max_y - min_y) * self.title_zone_fraction;
        fragments
            .iter()
            .filter(|f| size_key(f.font_size) == key)
            .all(|f| f.page == first && f.y <= cutoff)
    }

    /// Tier membership alone is not enough: the fragment must also look like a
    /// heading (bold, clearly larger than body text, or alone on its line).
    fn is_candidate(&self, fragment: &TextFragment, median: f32, lines: &LineIndex) -> bool {
        if fragment.text.chars().count() < 2 {
            return false;
        }
        fragment.is_bold
            || fragment.font_size > median * self.min_heading_ratio
            || lines.is_alone(fragment)
    }
}

fn fold_min(acc: Option<f32>, y: f32) -> Option<f32> {
    Some(match acc {
        Some(min) => min.min(y),
        None => y,
    })
}

fn first_page(fragments: &[TextFragment]) -> u32 {
    fragments.iter().map(|f| f.page).min().unwrap_or(1)
}

/// Median of body-range font sizes (8pt–14pt), falling back to the overall
/// median, then to 12pt for pathological streams.
fn body_median(fragments: &[TextFragment]) -> f32 {
    let mut sizes: Vec<f32> = fragments
        .iter()
        .map(|f| f.font_size)
        .filter(|size| (8.0..=14.0).contains(size))
        .collect();
    if sizes.is_empty() {
        sizes = fragments.iter().map(|f| f.font_size).collect();
    }
    if sizes.is_empty() {
        return 12.0;
    }
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sizes[sizes.len() / 2]
}

/// Short lines repeating on most pages are running headers/footers; they never
/// qualify as titles or headings.
fn furniture_texts(fragments: &[TextFragment], page_fraction: f32) -> HashSet<String> {
    let pages: HashSet<u32> = fragments.iter().map(|f| f.page).collect();
    let num_pages = pages.len();
    let mut on_pages: HashMap<&str, HashSet<u32>> = HashMap::new();
    for fragment in fragments {
        if fragment.text.is_empty() || fragment.text.chars().count() >= 80 {
            continue;
        }
        on_pages
            .entry(fragment.text.as_str())
            .or_default()
            .insert(fragment.page);
    }
    let threshold = ((num_pages as f32 * page_fraction) as usize).max(2);
    on_pages
        .into_iter()
        .filter(|(_, pages)| pages.len() >= threshold)
        .map(|(text, _)| text.to_string())
        .collect()
}

/// Per-page line occupancy used for the alone-on-line candidacy test.
struct LineIndex {
    counts: HashMap<(u32, i64), usize>,
    tolerance: f32,
}

impl LineIndex {
    fn build(fragments: &[TextFragment], tolerance: f32) -> Self {
        let tolerance = tolerance.max(f32::EPSILON);
        let mut counts: HashMap<(u32, i64), usize> = HashMap::new();
        for fragment in fragments {
            *counts.entry(Self::slot(fragment, tolerance)).or_insert(0) += 1;
        }
        Self { counts, tolerance }
    }

    fn slot(fragment: &TextFragment, tolerance: f32) -> (u32, i64) {
        (fragment.page, (fragment.y / tolerance).round() as i64)
    }

    fn is_alone(&self, fragment: &TextFragment) -> bool {
        self.counts
            .get(&Self::slot(fragment, self.tolerance))
            .copied()
            .unwrap_or(1)
            <= 1
    }
}

/// Merges the title fragment with trailing same-tier fragments on nearby lines
/// so wrapped titles come back as one string.
fn merge_title(fragments: &[TextFragment], start: usize, key: i32) -> String {
    let mut text = fragments[start].text.clone();
    let mut last = &fragments[start];
    for fragment in &fragments[start + 1..] {
        let close = fragment.page == last.page
            && (fragment.y - last.y).abs() <= last.font_size * 1.6
            && size_key(fragment.font_size) == key;
        if !close {
            break;
        }
        text.push(' ');
        text.push_str(&fragment.text);
        last = fragment;
    }
    collapse_whitespace(&text)
}

/// Accumulates heading candidates, merging adjacent fragments from the same
/// tier and vertical cluster into one heading.
struct HeadingMerger {
    headings: Vec<Heading>,
    open: Option<OpenHeading>,
}

struct OpenHeading {
    text: String,
    level: HeadingLevel,
    page: u32,
    key: i32,
    last_idx: usize,
    last_y: f32,
    last_size: f32,
}

impl HeadingMerger {
    fn new() -> Self {
        Self {
            headings: Vec::new(),
            open: None,
        }
    }

    fn push(&mut self, idx: usize, fragment: &TextFragment, key: i32, level: HeadingLevel) {
        if let Some(open) = &mut self.open {
            let adjacent = idx == open.last_idx + 1
                && fragment.page == open.page
                && key == open.key
                && (fragment.y - open.last_y).abs() <= open.last_size * 1.6;
            if adjacent {
                open.text.push(' ');
                open.text.push_str(&fragment.text);
                open.last_idx = idx;
                open.last_y = fragment.y;
                open.last_size = fragment.font_size;
                return;
            }
            self.flush();
        }
        self.open = Some(OpenHeading {
            text: fragment.text.clone(),
            level,
            page: fragment.page,
            key,
            last_idx: idx,
            last_y: fragment.y,
            last_size: fragment.font_size,
        });
    }

    /// A body fragment between candidates ends any open heading.
    fn interrupt(&mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        if let Some(open) = self.open.take() {
            self.headings.push(Heading {
                text: open.text,
                level: open.level,
                page: open.page,
            });
        }
    }

    fn finish(mut self) -> Vec<Heading> {
        self.flush();
        self.headings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, size: f32, bold: bool, page: u32, y: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            font_size: size,
            is_bold: bold,
            x: 72.0,
            y,
            page,
        }
    }

    fn build(fragments: &[TextFragment]) -> Outline {
        build_outline("doc", fragments, &FontTierHeuristic::default()).expect("outline")
    }

    #[test]
    fn empty_stream_is_an_error() {
        let err = build_outline("doc", &[], &FontTierHeuristic::default()).expect_err("empty");
        assert_eq!(err, OutlineError::EmptyDocument);
    }

    #[test]
    fn uniform_font_yields_title_only() {
        let fragments = vec![
            frag("Plain first line.", 11.0, false, 1, 50.0),
            frag("More body text follows here.", 11.0, false, 1, 70.0),
            frag("And a closing paragraph.", 11.0, false, 2, 50.0),
        ];
        let outline = build(&fragments);
        assert_eq!(outline.title, "Plain first line.");
        assert!(outline.headings.is_empty());
    }

    #[test]
    fn bold_tier_fragments_become_h1_headings() {
        // Two H1s sharing one tier on the same page, each followed by body text.
        let fragments = vec![
            frag("Introduction", 18.0, true, 1, 50.0),
            frag("This paper studies X.", 11.0, false, 1, 120.0),
            frag("Background", 18.0, true, 1, 300.0),
            frag("Prior work Y.", 11.0, false, 1, 380.0),
        ];
        let outline = build(&fragments);
        assert_eq!(
            outline.headings,
            vec![
                Heading {
                    text: "Introduction".to_string(),
                    level: HeadingLevel::H1,
                    page: 1
                },
                Heading {
                    text: "Background".to_string(),
                    level: HeadingLevel::H1,
                    page: 1
                },
            ]
        );
    }

    #[test]
    fn title_tier_claimed_only_near_top_of_first_page() {
        let fragments = vec![
            frag("Annual Report", 24.0, true, 1, 40.0),
            frag("Overview", 16.0, true, 1, 200.0),
            frag("Revenue grew this year.", 11.0, false, 1, 260.0),
            frag("Outlook", 16.0, true, 2, 80.0),
            frag("Next year looks similar.", 11.0, false, 2, 140.0),
        ];
        let outline = build(&fragments);
        assert_eq!(outline.title, "Annual Report");
        let texts: Vec<&str> = outline.headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["Overview", "Outlook"]);
        assert!(outline.headings.iter().all(|h| h.level == HeadingLevel::H1));
    }

    #[test]
    fn deeper_tiers_clamp_to_h3() {
        let fragments = vec![
            frag("Big Title", 26.0, true, 1, 20.0),
            frag("Part", 20.0, true, 1, 100.0),
            frag("body body body", 10.0, false, 1, 140.0),
            frag("Chapter", 18.0, true, 1, 200.0),
            frag("body body body again", 10.0, false, 1, 240.0),
            frag("Section", 16.0, true, 1, 300.0),
            frag("more body", 10.0, false, 1, 340.0),
            frag("Subsection", 15.0, true, 1, 400.0),
            frag("final body", 10.0, false, 1, 700.0),
        ];
        let outline = build(&fragments);
        let levels: Vec<HeadingLevel> = outline.headings.iter().map(|h| h.level).collect();
        assert_eq!(
            levels,
            [
                HeadingLevel::H1,
                HeadingLevel::H2,
                HeadingLevel::H3,
                HeadingLevel::H3
            ]
        );
    }

    #[test]
    fn heading_pages_never_decrease() {
        let fragments = vec![
            frag("Alpha", 18.0, true, 1, 50.0),
            frag("body", 11.0, false, 1, 90.0),
            frag("Beta", 18.0, true, 2, 50.0),
            frag("body", 11.0, false, 2, 90.0),
            frag("Gamma", 18.0, true, 4, 50.0),
        ];
        let outline = build(&fragments);
        let pages: Vec<u32> = outline.headings.iter().map(|h| h.page).collect();
        assert!(pages.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn wrapped_heading_lines_merge() {
        let fragments = vec![
            frag("A Very Long Heading", 18.0, true, 1, 100.0),
            frag("Split Over Two Lines", 18.0, true, 1, 120.0),
            frag("body text below", 11.0, false, 1, 160.0),
        ];
        let outline = build(&fragments);
        assert_eq!(outline.headings.len(), 1);
        assert_eq!(
            outline.headings[0].text,
            "A Very Long Heading Split Over Two Lines"
        );
    }

    #[test]
    fn wrapped_title_lines_merge() {
        let fragments = vec![
            frag("Comprehensive Guide", 24.0, true, 1, 40.0),
            frag("to Coastal Birds", 24.0, true, 1, 64.0),
            frag("Overview", 16.0, true, 1, 300.0),
            frag("body text here", 11.0, false, 1, 340.0),
        ];
        let outline = build(&fragments);
        assert_eq!(outline.title, "Comprehensive Guide to Coastal Birds");
        assert_eq!(outline.headings.len(), 1);
        assert_eq!(outline.headings[0].text, "Overview");
    }

    #[test]
    fn repeated_page_furniture_suppressed() {
        let mut fragments = Vec::new();
        for page in 1..=5 {
            fragments.push(frag("ACME Corp Confidential", 16.0, true, page, 10.0));
            fragments.push(frag(&format!("Body on page {page}."), 11.0, false, page, 200.0));
        }
        fragments.insert(1, frag("Findings", 16.0, true, 1, 100.0));
        let outline = build(&fragments);
        let texts: Vec<&str> = outline.headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["Findings"]);
        assert_ne!(outline.title, "ACME Corp Confidential");
    }

    #[test]
    fn emphasized_body_phrase_not_a_heading() {
        // In-tier size but neither bold nor alone on its line nor clearly
        // larger than body text.
        let fragments = vec![
            frag("Intro", 18.0, true, 1, 50.0),
            frag("body starts", 11.5, false, 1, 120.0),
            frag("important phrase", 12.0, false, 1, 120.5),
            frag("body continues", 11.5, false, 1, 121.0),
        ];
        let heuristic = FontTierHeuristic::with_min_ratio(1.2);
        let outline = build_outline("doc", &fragments, &heuristic).expect("outline");
        assert!(outline
            .headings
            .iter()
            .all(|h| h.text != "important phrase"));
    }

    #[test]
    fn duplicate_headings_deduplicated() {
        let fragments = vec![
            frag("Notes", 18.0, true, 1, 50.0),
            frag("body", 11.0, false, 1, 90.0),
            frag("Notes", 18.0, true, 1, 300.0),
            frag("tail", 11.0, false, 1, 340.0),
        ];
        let outline = build(&fragments);
        assert_eq!(outline.headings.len(), 1);
    }
}
