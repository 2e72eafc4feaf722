//! Section segmentation: binding body text to the outline hierarchy.

use crate::fragment::{collapse_whitespace, TextFragment};
use crate::outline::{Heading, HeadingLevel, Outline};
use serde::Serialize;

/// Contiguous body text owned by one heading.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    /// Identifier of the owning document.
    pub document_id: String,
    /// The heading this section hangs off.
    pub heading: Heading,
    /// Page the section starts on.
    pub page: u32,
    /// Whitespace-normalized body text; codepoints preserved exactly.
    pub text: String,
}

/// Splits a document's fragment stream into sections bound to its outline.
///
/// Each section spans from just after its heading up to the next heading of
/// equal-or-higher level, or the end of the stream. A heading-less outline
/// yields a single synthetic section covering the whole body so downstream
/// ranking always has at least one candidate.
pub fn segment(outline: &Outline, fragments: &[TextFragment]) -> Vec<Section> {
    if outline.headings.is_empty() {
        let text = join_fragments(fragments.iter());
        return vec![Section {
            document_id: outline.document_id.clone(),
            heading: Heading {
                text: outline.title.clone(),
                level: HeadingLevel::H1,
                page: 1,
            },
            page: 1,
            text,
        }];
    }

    let anchors = locate_headings(outline, fragments);
    let mut sections = Vec::with_capacity(outline.headings.len());
    for (i, heading) in outline.headings.iter().enumerate() {
        let Some(anchor) = anchors[i] else {
            // Heading text could not be re-located in the stream; keep the
            // section so counts line up, with no body text.
            sections.push(Section {
                document_id: outline.document_id.clone(),
                heading: heading.clone(),
                page: heading.page,
                text: String::new(),
            });
            continue;
        };
        let boundary = outline.headings[i + 1..]
            .iter()
            .zip(&anchors[i + 1..])
            .find(|(next, next_anchor)| next.level <= heading.level && next_anchor.is_some())
            .and_then(|(_, next_anchor)| next_anchor.map(|a| a.start))
            .unwrap_or(fragments.len());
        let text = join_fragments(fragments[anchor.end..boundary].iter());
        sections.push(Section {
            document_id: outline.document_id.clone(),
            heading: heading.clone(),
            page: heading.page,
            text,
        });
    }
    sections
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    /// Index of the first fragment belonging to the heading.
    start: usize,
    /// Exclusive index past the fragments consumed by the heading text.
    end: usize,
}

/// Re-locates each heading inside the fragment stream with a forward cursor,
/// consuming the fragments that make up wrapped heading text.
fn locate_headings(outline: &Outline, fragments: &[TextFragment]) -> Vec<Option<Anchor>> {
    let mut anchors = Vec::with_capacity(outline.headings.len());
    let mut cursor = 0usize;
    for heading in &outline.headings {
        let found = fragments[cursor..]
            .iter()
            .position(|f| f.page == heading.page && heading.text.starts_with(f.text.as_str()))
            .map(|offset| cursor + offset);
        let Some(start) = found else {
            anchors.push(None);
            continue;
        };
        let mut accumulated = fragments[start].text.clone();
        let mut end = start + 1;
        while accumulated.len() < heading.text.len() && end < fragments.len() {
            let extended = format!("{accumulated} {}", fragments[end].text);
            if heading.text.starts_with(extended.as_str()) {
                accumulated = extended;
                end += 1;
            } else {
                break;
            }
        }
        anchors.push(Some(Anchor { start, end }));
        cursor = end;
    }
    anchors
}

fn join_fragments<'a, I: Iterator<Item = &'a TextFragment>>(fragments: I) -> String {
    let mut text = String::new();
    for fragment in fragments {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&fragment.text);
    }
    collapse_whitespace(&text)
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

    fn heading(text: &str, level: HeadingLevel, page: u32) -> Heading {
        Heading {
            text: text.to_string(),
            level,
            page,
        }
    }

    fn outline(headings: Vec<Heading>) -> Outline {
        Outline {
            document_id: "doc".to_string(),
            title: "Title".to_string(),
            headings,
        }
    }

    #[test]
    fn each_section_owns_its_following_text() {
        let fragments = vec![
            frag("Introduction", 18.0, true, 1, 50.0),
            frag("This paper studies X.", 11.0, false, 1, 120.0),
            frag("Background", 18.0, true, 1, 300.0),
            frag("Prior work Y.", 11.0, false, 1, 380.0),
        ];
        let outline = outline(vec![
            heading("Introduction", HeadingLevel::H1, 1),
            heading("Background", HeadingLevel::H1, 1),
        ]);
        let sections = segment(&outline, &fragments);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].text, "This paper studies X.");
        assert_eq!(sections[1].text, "Prior work Y.");
    }

    #[test]
    fn flat_outline_partitions_body_text() {
        let fragments = vec![
            frag("preamble ignored", 11.0, false, 1, 10.0),
            frag("A", 18.0, true, 1, 50.0),
            frag("one", 11.0, false, 1, 90.0),
            frag("two", 11.0, false, 1, 110.0),
            frag("B", 18.0, true, 2, 50.0),
            frag("three", 11.0, false, 2, 90.0),
            frag("C", 18.0, true, 2, 200.0),
            frag("four", 11.0, false, 2, 240.0),
        ];
        let outline = outline(vec![
            heading("A", HeadingLevel::H1, 1),
            heading("B", HeadingLevel::H1, 2),
            heading("C", HeadingLevel::H1, 2),
        ]);
        let sections = segment(&outline, &fragments);
        let joined: Vec<String> = sections.iter().map(|s| s.text.clone()).collect();
        // No gaps, no overlaps: together the sections are exactly the body
        // text that follows the first heading.
        assert_eq!(joined, ["one two", "three", "four"]);
    }

    #[test]
    fn lower_level_section_bounded_by_higher_level_heading() {
        let fragments = vec![
            frag("Methods", 18.0, true, 1, 50.0),
            frag("method overview", 11.0, false, 1, 90.0),
            frag("Sampling", 15.0, true, 1, 150.0),
            frag("sampling details", 11.0, false, 1, 190.0),
            frag("Results", 18.0, true, 2, 50.0),
            frag("result text", 11.0, false, 2, 90.0),
        ];
        let outline = outline(vec![
            heading("Methods", HeadingLevel::H1, 1),
            heading("Sampling", HeadingLevel::H2, 1),
            heading("Results", HeadingLevel::H1, 2),
        ]);
        let sections = segment(&outline, &fragments);
        // The H1 span runs through its nested H2 up to the next H1.
        assert_eq!(
            sections[0].text,
            "method overview Sampling sampling details"
        );
        assert_eq!(sections[1].text, "sampling details");
        assert_eq!(sections[2].text, "result text");
    }

    #[test]
    fn headingless_outline_yields_synthetic_section() {
        let fragments = vec![
            frag("Some Title", 11.0, false, 1, 50.0),
            frag("body continues here", 11.0, false, 1, 90.0),
        ];
        let outline = Outline {
            document_id: "doc".to_string(),
            title: "Some Title".to_string(),
            headings: Vec::new(),
        };
        let sections = segment(&outline, &fragments);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading.text, "Some Title");
        assert_eq!(sections[0].heading.level, HeadingLevel::H1);
        assert_eq!(sections[0].page, 1);
        assert_eq!(sections[0].text, "Some Title body continues here");
    }

    #[test]
    fn wrapped_heading_fragments_excluded_from_section_text() {
        let fragments = vec![
            frag("Long Heading", 18.0, true, 1, 50.0),
            frag("Continued", 18.0, true, 1, 70.0),
            frag("actual body", 11.0, false, 1, 120.0),
        ];
        let outline = outline(vec![heading("Long Heading Continued", HeadingLevel::H1, 1)]);
        let sections = segment(&outline, &fragments);
        assert_eq!(sections[0].text, "actual body");
    }

    #[test]
    fn non_latin_text_preserved_exactly() {
        let fragments = vec![
            frag("अध्याय", 18.0, true, 1, 50.0),
            frag("यह   एक  परीक्षण है।", 11.0, false, 1, 90.0),
        ];
        let outline = outline(vec![heading("अध्याय", HeadingLevel::H1, 1)]);
        let sections = segment(&outline, &fragments);
        assert_eq!(sections[0].text, "यह एक परीक्षण है।");
    }
}
