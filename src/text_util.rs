/// Maximum number of characters in a result preview before truncation.
pub const PREVIEW_MAX_CHARS: usize = 300;

/// Lower-cased, de-duplicated whitespace-separated terms of a query.
///
/// Terms keep their first-appearance order. A blank query has no terms.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query.to_lowercase().split_whitespace() {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// Fraction of `terms` that occur as substrings of `text_lower`.
///
/// `text_lower` must already be lower-cased. Returns 0 with no terms.
pub fn keyword_score(terms: &[String], text_lower: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let matched = terms
        .iter()
        .filter(|term| text_lower.contains(term.as_str()))
        .count();
    matched as f64 / terms.len() as f64
}

/// Whether the whole lower-cased query occurs in `text_lower`.
///
/// A blank query never matches.
pub fn is_exact_match(query_lower: &str, text_lower: &str) -> bool {
    !query_lower.trim().is_empty() && text_lower.contains(query_lower)
}

/// Truncate `text` to at most `max_chars` characters, appending `...` when
/// anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
