//! Result assembly into the documented JSON report shapes.

use crate::outline::{HeadingLevel, Outline};
use crate::ranker::{QueryContext, RankedSection, SubsectionAnalysis};
use chrono::Utc;
use serde::Serialize;

/// Per-document outline report: `{"title": ..., "outline": [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineReport {
    /// Document title.
    pub title: String,
    /// Headings in document order.
    pub outline: Vec<OutlineEntry>,
}

/// One outline row.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    /// Heading level (`"H1"` | `"H2"` | `"H3"`).
    pub level: HeadingLevel,
    /// Heading text.
    pub text: String,
    /// 1-based page anchor.
    pub page: u32,
}

impl OutlineReport {
    /// Projects an [`Outline`] into its report shape.
    pub fn from_outline(outline: &Outline) -> Self {
        Self {
            title: outline.title.clone(),
            outline: outline
                .headings
                .iter()
                .map(|h| OutlineEntry {
                    level: h.level,
                    text: h.text.clone(),
                    page: h.page,
                })
                .collect(),
        }
    }
}

/// Aggregate document-intelligence report across one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct IntelligenceReport {
    /// Run-level metadata.
    pub metadata: RunMetadata,
    /// Ranked sections, best first.
    pub extracted_sections: Vec<ExtractedSectionEntry>,
    /// Refined-text excerpts for the top-ranked sections.
    pub sub_section_analysis: Vec<SubSectionEntry>,
}

/// Metadata block of the intelligence report.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// Input document identifiers, in submission order.
    pub documents: Vec<String>,
    /// Persona string the run was conditioned on.
    pub persona: String,
    /// Job-to-be-done string.
    pub job_to_be_done: String,
    /// UTC run timestamp, `%Y-%m-%dT%H:%M:%S`.
    pub timestamp: String,
    /// Per-document processing outcome; one failed document never hides its
    /// siblings' results.
    pub document_status: Vec<DocumentStatus>,
}

/// One ranked-section row.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedSectionEntry {
    /// Owning document identifier.
    pub document: String,
    /// Page the section starts on.
    pub page: u32,
    /// Section heading text.
    pub section_title: String,
    /// Dense importance rank, 1 = best.
    pub importance_rank: usize,
}

/// One refined-text row.
#[derive(Debug, Clone, Serialize)]
pub struct SubSectionEntry {
    /// Owning document identifier.
    pub document: String,
    /// Page the parent section starts on.
    pub page: u32,
    /// Extractive excerpt, original sentence order.
    pub refined_text: String,
}

/// Processing outcome for one document in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    /// Document identifier.
    pub document: String,
    /// `ok` or `failed`.
    pub status: RunStatus,
    /// Failure detail, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Success marker for [`DocumentStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The document produced an outline and sections.
    Ok,
    /// The document was skipped; see the error detail.
    Failed,
}

impl DocumentStatus {
    /// Marks a document as processed.
    pub fn ok(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            status: RunStatus::Ok,
            error: None,
        }
    }

    /// Marks a document as failed with a reason.
    pub fn failed(document: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            status: RunStatus::Failed,
            error: Some(error.into()),
        }
    }
}

impl IntelligenceReport {
    /// Assembles the aggregate report from ranker output.
    pub fn assemble(
        documents: Vec<String>,
        query: &QueryContext,
        ranked: &[RankedSection],
        analyses: &[SubsectionAnalysis],
        document_status: Vec<DocumentStatus>,
    ) -> Self {
        Self {
            metadata: RunMetadata {
                documents,
                persona: query.persona.clone(),
                job_to_be_done: query.job.clone(),
                timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                document_status,
            },
            extracted_sections: ranked
                .iter()
                .map(|entry| ExtractedSectionEntry {
                    document: entry.section.document_id.clone(),
                    page: entry.section.page,
                    section_title: entry.section.heading.text.clone(),
                    importance_rank: entry.importance_rank,
                })
                .collect(),
            sub_section_analysis: analyses
                .iter()
                .map(|analysis| SubSectionEntry {
                    document: analysis.document_id.clone(),
                    page: analysis.page,
                    refined_text: analysis.refined_text.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::Heading;
    use crate::segment::Section;

    #[test]
    fn outline_report_serializes_documented_shape() {
        let outline = Outline {
            document_id: "report".to_string(),
            title: "Annual Report".to_string(),
            headings: vec![Heading {
                text: "Overview".to_string(),
                level: HeadingLevel::H1,
                page: 2,
            }],
        };
        let json = serde_json::to_value(OutlineReport::from_outline(&outline)).expect("serialize");
        assert_eq!(json["title"], "Annual Report");
        assert_eq!(json["outline"][0]["level"], "H1");
        assert_eq!(json["outline"][0]["text"], "Overview");
        assert_eq!(json["outline"][0]["page"], 2);
    }

    #[test]
    fn intelligence_report_serializes_documented_shape() {
        let query = QueryContext::new("Analyst", "review filings");
        let section = Section {
            document_id: "10k".to_string(),
            heading: Heading {
                text: "Risk Factors".to_string(),
                level: HeadingLevel::H1,
                page: 7,
            },
            page: 7,
            text: "Risks are enumerated.".to_string(),
        };
        let ranked = vec![RankedSection {
            section,
            score: 0.8,
            importance_rank: 1,
        }];
        let analyses = vec![SubsectionAnalysis {
            document_id: "10k".to_string(),
            page: 7,
            refined_text: "Risks are enumerated.".to_string(),
        }];
        let statuses = vec![
            DocumentStatus::ok("10k"),
            DocumentStatus::failed("empty-doc", "document has no extractable text"),
        ];
        let report =
            IntelligenceReport::assemble(vec!["10k".to_string()], &query, &ranked, &analyses, statuses);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["metadata"]["persona"], "Analyst");
        assert_eq!(json["metadata"]["job_to_be_done"], "review filings");
        assert_eq!(json["metadata"]["documents"][0], "10k");
        assert_eq!(json["metadata"]["document_status"][1]["status"], "failed");
        assert!(json["metadata"]["document_status"][0]
            .get("error")
            .is_none());
        let entry = &json["extracted_sections"][0];
        assert_eq!(entry["document"], "10k");
        assert_eq!(entry["page"], 7);
        assert_eq!(entry["section_title"], "Risk Factors");
        assert_eq!(entry["importance_rank"], 1);
        assert_eq!(json["sub_section_analysis"][0]["refined_text"], "Risks are enumerated.");
        let timestamp = json["metadata"]["timestamp"].as_str().expect("timestamp");
        assert_eq!(timestamp.len(), 19);
        assert_eq!(&timestamp[10..11], "T");
    }
}
