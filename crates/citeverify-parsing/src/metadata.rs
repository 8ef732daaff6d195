use once_cell::sync::Lazy;
use regex::Regex;

/// Title candidates this short (after trimming trailing periods) are discarded.
const MIN_TITLE_LEN: usize = 10;

/// Best-effort structured view of one raw reference string.
///
/// Only `raw` is guaranteed. Missing fields are not errors; they just mean
/// fewer lookup paths are attempted downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationMetadata {
    pub raw: String,
    pub authors: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
}

impl CitationMetadata {
    /// Short human-readable label: the title if one was extracted, else the raw text.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.raw)
    }
}

/// Extract DOI, year, authors and title from a raw reference.
///
/// Heuristic, never fails. Title and authors come from splitting on `". "`:
/// the author block is the first segment and the title the second. Styles
/// whose author list contains `". "` (initials such as `Smith, J. A.`) will
/// yield a wrong title; matching downstream is similarity-gated, so that is
/// tolerated rather than guessed around.
pub fn extract(raw: &str) -> CitationMetadata {
    let parts: Vec<&str> = raw.split(". ").collect();

    let title = match parts.len() {
        0 | 1 => None,
        _ => title_candidate(parts[1]),
    };

    let authors = parts
        .first()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(String::from);

    CitationMetadata {
        raw: raw.to_string(),
        authors,
        title,
        year: extract_year(raw),
        doi: extract_doi(raw),
    }
}

/// First DOI-shaped token in `text`, with trailing periods removed.
pub fn extract_doi(text: &str) -> Option<String> {
    static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,}/[^\s,;]+").unwrap());

    DOI_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|d| !d.is_empty())
        .map(String::from)
}

/// First 19xx/20xx year, optionally bracketed and optionally followed by a
/// disambiguation letter (`2020a`). Only the digits are returned.
pub fn extract_year(text: &str) -> Option<String> {
    static YEAR_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[(\[]?((?:19|20)\d{2})[a-z]?[)\]]?").unwrap());

    YEAR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn title_candidate(segment: &str) -> Option<String> {
    let candidate = segment.trim().trim_end_matches('.');
    if candidate.chars().count() > MIN_TITLE_LEN {
        Some(candidate.to_string())
    } else {
        None
    }
}
