//! Bibliography segmentation and citation metadata extraction.
//!
//! Everything here is pure text processing: no I/O, no errors. Absence of a
//! bibliography header or of a field is reported as an empty result, never as
//! a failure.

pub mod metadata;
pub mod section;

pub use metadata::{CitationMetadata, extract, extract_doi, extract_year};
pub use section::{
    MIN_REFERENCE_LEN, Segmentation, SegmentationStrategy, find_bibliography_section,
    segment_references, split_references,
};

/// Outcome of turning manuscript text into candidate citations.
#[derive(Debug, Clone)]
pub struct ParsedBibliography {
    /// Whether a bibliography header was found. When it was not, the whole
    /// document was segmented instead.
    pub section_found: bool,
    pub strategy: SegmentationStrategy,
    pub citations: Vec<CitationMetadata>,
}

/// Segment manuscript text and extract metadata for every reference.
///
/// Falls back to the full text when no bibliography header is present.
pub fn parse_manuscript(text: &str) -> ParsedBibliography {
    let section = find_bibliography_section(text);
    let section_found = !section.is_empty();
    let body = if section_found { section } else { text };

    let segmentation = segment_references(body);
    ParsedBibliography {
        section_found,
        strategy: segmentation.strategy,
        citations: segmentation.references.iter().map(|r| extract(r)).collect(),
    }
}
