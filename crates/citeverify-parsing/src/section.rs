use once_cell::sync::Lazy;
use regex::Regex;

/// Fragments this short (in characters, after trimming) are treated as noise,
/// e.g. a stray `3.` left behind by the numbered-list split.
pub const MIN_REFERENCE_LEN: usize = 15;

/// Which splitting strategy produced a segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationStrategy {
    /// Lines introduced by `N.`, `N)` or `[N]`.
    Numbered,
    /// Blank-line delimited paragraphs.
    Paragraph,
}

impl SegmentationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numbered => "numbered",
            Self::Paragraph => "paragraph",
        }
    }
}

/// Result of splitting a bibliography into raw reference strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub strategy: SegmentationStrategy,
    /// Raw references in order of appearance.
    pub references: Vec<String>,
}

/// Locate the bibliography section in manuscript text.
///
/// Looks for the first line consisting solely of one of the headers
/// "References", "Bibliography", "Works Cited" or "Literature Cited"
/// (case-insensitive, surrounding spaces allowed) and returns everything
/// after that line. Returns an empty string when no header is found; falling
/// back to the whole document is left to the caller.
pub fn find_bibliography_section(text: &str) -> &str {
    static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?im)^[ \t]*(?:references|bibliography|works[ \t]+cited|literature[ \t]+cited)[ \t]*\r?$",
        )
        .unwrap()
    });

    let Some(m) = HEADER_RE.find(text) else {
        return "";
    };

    let rest = &text[m.end()..];
    // Skip the newline that terminates the header line itself.
    rest.strip_prefix('\n').unwrap_or(rest)
}

/// Split a bibliography section into individual raw references.
///
/// See [`segment_references`] for the policy; this returns only the strings.
pub fn split_references(section_text: &str) -> Vec<String> {
    segment_references(section_text).references
}

/// Split a bibliography section, reporting which strategy won.
///
/// 1. Numbered list: a new reference starts on every line introduced by
///    `N.`, `N)` or `[N]`. Accepted when at least two fragments longer than
///    [`MIN_REFERENCE_LEN`] survive.
/// 2. Otherwise blank-line delimited paragraphs, with the same noise filter.
pub fn segment_references(section_text: &str) -> Segmentation {
    let numbered = split_numbered(section_text);
    if numbered.len() >= 2 {
        return Segmentation {
            strategy: SegmentationStrategy::Numbered,
            references: numbered,
        };
    }

    Segmentation {
        strategy: SegmentationStrategy::Paragraph,
        references: split_paragraphs(section_text),
    }
}

fn split_numbered(text: &str) -> Vec<String> {
    static MARKER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)^[ \t]*\[?\d+[\].)]\s+").unwrap());

    let mut fragments = Vec::new();
    let mut start = 0;
    for m in MARKER_RE.find_iter(text) {
        fragments.push(&text[start..m.start()]);
        start = m.end();
    }
    fragments.push(&text[start..]);

    keep_substantial(fragments)
}

fn split_paragraphs(text: &str) -> Vec<String> {
    static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
    keep_substantial(BLANK_LINE_RE.split(text))
}

fn keep_substantial<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| f.chars().count() > MIN_REFERENCE_LEN)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_references_header() {
        let text = "Intro text.\n\nReferences\n1. Smith J. A great paper. Journal X. 2020.\n";
        let section = find_bibliography_section(text);
        assert!(section.starts_with("1. Smith J."));
    }

    #[test]
    fn header_is_case_insensitive_and_may_be_indented() {
        let text = "Body.\n   BIBLIOGRAPHY  \nDoe A. Something long enough here.";
        assert_eq!(
            find_bibliography_section(text),
            "Doe A. Something long enough here."
        );
    }

    #[test]
    fn multiword_headers() {
        assert_eq!(
            find_bibliography_section("x\nWorks Cited\nrest"),
            "rest"
        );
        assert_eq!(
            find_bibliography_section("x\nliterature cited\nrest"),
            "rest"
        );
    }

    #[test]
    fn header_inside_sentence_is_ignored() {
        let text = "See the references below for details.\nNothing else.";
        assert_eq!(find_bibliography_section(text), "");
    }

    #[test]
    fn first_header_wins() {
        let text = "Body\nReferences\nfirst list\nBibliography\nsecond list";
        let section = find_bibliography_section(text);
        assert!(section.starts_with("first list"));
    }

    #[test]
    fn header_with_crlf_line_endings() {
        let text = "Body\r\nReferences\r\n1. Smith J. A paper.";
        let section = find_bibliography_section(text);
        assert!(section.starts_with("1. Smith J."));
    }

    #[test]
    fn numbered_list_splits_in_order() {
        let text = "References\n1. Smith J. A great paper. Journal X. 2020.\n\n2. Doe A. Another one. Journal Y. 2019.";
        let section = find_bibliography_section(text);
        let refs = split_references(section);
        assert_eq!(refs.len(), 2);
        assert!(refs[0].contains("Smith"));
        assert!(refs[1].contains("Doe"));
    }

    #[test]
    fn bracket_and_paren_markers() {
        let text = "[1] Alpha A. First reference title. 2001.\n[2] Beta B. Second reference title. 2002.\n3) Gamma C. Third reference title. 2003.";
        let seg = segment_references(text);
        assert_eq!(seg.strategy, SegmentationStrategy::Numbered);
        assert_eq!(seg.references.len(), 3);
        assert!(seg.references[2].starts_with("Gamma"));
    }

    #[test]
    fn stray_numeral_is_dropped() {
        let text = "1. Smith J. A great paper. Journal X. 2020.\n3.\n2. Doe A. Another one. Journal Y. 2019.";
        let refs = split_references(text);
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.chars().count() > MIN_REFERENCE_LEN));
        assert!(!refs.iter().any(|r| r.trim() == "3."));
    }

    #[test]
    fn continuation_lines_stay_with_their_reference() {
        let text = "1. Smith J. A great paper\n   spanning two lines. Journal X. 2020.\n2. Doe A. Another one. Journal Y. 2019.";
        let refs = split_references(text);
        assert_eq!(refs.len(), 2);
        assert!(refs[0].contains("spanning two lines"));
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let text = "Smith J. A great paper. Journal X. 2020.\n\nDoe A. Another one. Journal Y. 2019.\n\nshort";
        let seg = segment_references(text);
        assert_eq!(seg.strategy, SegmentationStrategy::Paragraph);
        assert_eq!(seg.references.len(), 2);
    }

    #[test]
    fn single_numbered_item_uses_paragraph_fallback() {
        let text = "1. Smith J. A great paper. Journal X. 2020.";
        let seg = segment_references(text);
        assert_eq!(seg.strategy, SegmentationStrategy::Paragraph);
        assert_eq!(seg.references, vec![text.to_string()]);
    }

    #[test]
    fn fifteen_chars_is_noise() {
        let exactly_fifteen = "abcdefghijklmno";
        assert_eq!(exactly_fifteen.len(), MIN_REFERENCE_LEN);
        assert!(split_references(exactly_fifteen).is_empty());
        assert_eq!(split_references("abcdefghijklmnop").len(), 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split_references("").is_empty());
        assert!(split_references("   \n\n  ").is_empty());
    }
}
