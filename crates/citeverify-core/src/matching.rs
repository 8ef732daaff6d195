//! Title canonicalisation and similarity scoring.
//!
//! Every source routes title confirmation through [`title_similarity`] with the
//! threshold carried in [`Config`](crate::Config), so "do these two titles
//! name the same work" has exactly one answer across the crate.

/// Default minimum similarity for accepting a title-based match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.55;

/// Canonicalise a title for comparison.
///
/// Lowercases, drops every character that is neither alphanumeric nor
/// whitespace, collapses whitespace runs to one space and trims. Nothing
/// else is rewritten: an HTML entity such as `&amp;` keeps its letters.
pub fn normalize_title(title: &str) -> String {
    if title.is_empty() {
        return String::new();
    }

    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in `[0, 1]` between two titles after normalisation.
///
/// Returns 0.0 when either side normalises to nothing, so missing data never
/// produces a match. Otherwise this is the indel ratio
/// `2 * matches / (len_a + len_b)` over characters: symmetric, 1.0 for equal
/// strings and 0.0 for strings sharing no characters.
///
/// The default 0.55 threshold was tuned against difflib's
/// longest-matching-block ratio. The indel ratio is never lower for the same
/// pair, so at the same threshold it accepts somewhat more candidates.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize_title(a);
    let norm_b = normalize_title(b);

    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }

    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars())
}

/// Whether `candidate` is similar enough to `title` under `threshold`.
/// Returns the score on acceptance.
pub fn confirm_title(title: &str, candidate: &str, threshold: f64) -> Option<f64> {
    let score = title_similarity(title, candidate);
    (score >= threshold).then_some(score)
}
