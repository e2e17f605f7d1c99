//! Picks the search result that belongs to the term.
//!
//! The rule is deliberately simple: the first visible candidate, in render
//! order, whose text contains the term case-insensitively. When a directory
//! lists several entries containing the same name the first one is taken.

use crate::page::RenderedElement;

/// Select the candidate to open for `term`, or `None` if nothing matches.
pub fn select_candidate<'a>(term: &str, candidates: &'a [RenderedElement]) -> Option<&'a RenderedElement> {
    let needle = term.to_lowercase();
    candidates
        .iter()
        .find(|c| c.visible && c.text.to_lowercase().contains(&needle))
}

/// Whether a rendered title names the term (case-insensitive containment).
pub fn title_matches(term: &str, title: &str) -> bool {
    title.to_lowercase().contains(&term.to_lowercase())
}
