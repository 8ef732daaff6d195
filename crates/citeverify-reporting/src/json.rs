//! Canonical JSON report.
//!
//! Field names are stable. Each source gets its own sub-object keyed by the
//! source key, with its identifier under a source-specific name (`pmid`,
//! `paper_id`, `doi`). Similarities are rounded to three decimals.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use citeverify_core::{Report, SourceResult, Summary, VerificationEntry};

#[derive(Serialize)]
struct ReportDoc<'a> {
    manuscript: &'a str,
    total_references: usize,
    summary: SummaryDoc,
    section_found: bool,
    segmentation: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    interrupted: bool,
    results: Vec<EntryDoc<'a>>,
}

#[derive(Serialize)]
struct SummaryDoc {
    total: usize,
    verified: usize,
    partially_verified: usize,
    not_found: usize,
    verification_rate: String,
}

impl From<Summary> for SummaryDoc {
    fn from(s: Summary) -> Self {
        Self {
            total: s.total,
            verified: s.verified,
            partially_verified: s.partially_verified,
            not_found: s.not_found,
            verification_rate: s.rate_display(),
        }
    }
}

struct EntryDoc<'a>(&'a VerificationEntry);

impl Serialize for EntryDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entry = self.0;
        let meta = &entry.metadata;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("index", &entry.index)?;
        map.serialize_entry("raw", &meta.raw)?;
        map.serialize_entry("extracted_authors", &meta.authors)?;
        map.serialize_entry("extracted_title", &meta.title)?;
        map.serialize_entry("extracted_doi", &meta.doi)?;
        map.serialize_entry("extracted_year", &meta.year)?;
        for source in &entry.sources {
            map.serialize_entry(source.key, &SourceDoc(source))?;
        }
        map.serialize_entry("status", entry.status().as_str())?;
        map.end()
    }
}

struct SourceDoc<'a>(&'a SourceResult);

impl Serialize for SourceDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("found", &result.found)?;
        map.serialize_entry(identifier_field(result.key), &result.identifier)?;
        map.serialize_entry("method", &result.method.map(|m| m.as_str()))?;
        map.serialize_entry("matched_title", &result.matched_title)?;
        map.serialize_entry("similarity", &result.similarity.map(round3))?;
        if let Some(ref error) = result.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

/// Name of the identifier field for a source key.
pub fn identifier_field(key: &str) -> &'static str {
    match key {
        "pubmed" => "pmid",
        "semantic_scholar" => "paper_id",
        "crossref" => "doi",
        _ => "identifier",
    }
}

pub(crate) fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Render a report as pretty-printed JSON. Non-ASCII text is kept as is.
pub fn export_json(report: &Report) -> Result<String, serde_json::Error> {
    let doc = ReportDoc {
        manuscript: &report.manuscript,
        total_references: report.total_references(),
        summary: report.summary().into(),
        section_found: report.section_found,
        segmentation: report.strategy.as_str(),
        interrupted: report.interrupted,
        results: report.entries.iter().map(EntryDoc).collect(),
    };
    serde_json::to_string_pretty(&doc)
}
