//! Search Term Normalization
//!
//! Input datasets carry organization names in whatever form people typed
//! them. The directory search works best with the distinctive part of the
//! name, so this module:
//! - Collapses runs of whitespace and trims the ends
//! - Strips trailing qualifier phrases, case-insensitively
//!   ("Some Unified School District" -> "Some Unified")
//! - Never produces an empty search string for a non-empty input
//!
//! The original spelling is kept alongside as the output join key.

use regex::Regex;
use tracing::debug;

/// Qualifier phrases stripped when no configuration overrides them.
/// Longer phrases first so "school district" wins over "district".
pub const DEFAULT_SUFFIXES: &[&str] = &["school district", "district"];

/// One input term: the original text (join key) and the string actually searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub raw: String,
    pub normalized: String,
}

/// Deterministic, idempotent term normalizer.
#[derive(Debug, Clone)]
pub struct TermNormalizer {
    /// Trailing-phrase patterns, each anchored to the end of the term and
    /// requiring whitespace before the phrase
    suffix_rules: Vec<Regex>,
}

impl Default for TermNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TermNormalizer {
    /// Normalizer with the built-in suffix list.
    pub fn new() -> Self {
        // Built-in phrases are plain words, so compilation cannot fail.
        Self::with_suffixes(DEFAULT_SUFFIXES).unwrap_or(Self { suffix_rules: Vec::new() })
    }

    /// Build a normalizer stripping the given trailing phrases.
    ///
    /// Phrases are matched as whole words with any whitespace between them.
    pub fn with_suffixes<S: AsRef<str>>(suffixes: &[S]) -> Result<Self, regex::Error> {
        let suffix_rules = suffixes
            .iter()
            .map(|s| s.as_ref().split_whitespace().map(regex::escape).collect::<Vec<_>>())
            .filter(|words| !words.is_empty())
            .map(|words| Regex::new(&format!(r"(?i)\s+{}$", words.join(r"\s+"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { suffix_rules })
    }

    /// Create a normalizer from the `[normalizer]` config section.
    pub fn from_config(config: &crate::config::NormalizerConfig) -> Result<Self, regex::Error> {
        Self::with_suffixes(config.strip_suffixes.as_slice())
    }

    /// Canonical search string for `term`.
    ///
    /// Rules are applied until none of them changes the term. A rule whose
    /// removal would leave nothing is not applied, which keeps the result
    /// non-empty and makes `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, term: &str) -> String {
        let mut current = collapse_whitespace(term);

        loop {
            let stripped = self.suffix_rules.iter().find_map(|rule| {
                let m = rule.find(&current)?;
                let rest = current[..m.start()].trim_end();
                if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_string())
                }
            });

            match stripped {
                Some(next) => current = next,
                None => break,
            }
        }

        if current != term {
            debug!("Normalized search term '{}' -> '{}'", term, current);
        }
        current
    }

    /// Pair a raw term with its normalized form.
    pub fn search_term(&self, raw: &str) -> SearchTerm {
        SearchTerm {
            raw: raw.to_string(),
            normalized: self.normalize(raw),
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_school_district_suffix() {
        let n = TermNormalizer::new();
        assert_eq!(n.normalize("Some Unified School District"), "Some Unified");
        assert_eq!(n.normalize("Manteca Unified"), "Manteca Unified");
    }

    #[test]
    fn test_suffix_match_is_case_insensitive() {
        let n = TermNormalizer::new();
        assert_eq!(n.normalize("san francisco unified SCHOOL district"), "san francisco unified");
        assert_eq!(n.normalize("Oak Grove DISTRICT"), "Oak Grove");
    }

    #[test]
    fn test_collapses_internal_whitespace() {
        let n = TermNormalizer::new();
        assert_eq!(n.normalize("  Los   Angeles\tUnified  "), "Los Angeles Unified");
        assert_eq!(n.normalize("Fresno  School \n District"), "Fresno");
    }

    #[test]
    fn test_suffix_must_be_whole_trailing_word() {
        let n = TermNormalizer::new();
        // "Subdistrict" is not the word "district"
        assert_eq!(n.normalize("North Subdistrict"), "North Subdistrict");
        assert_eq!(n.normalize("District Office"), "District Office");
    }

    #[test]
    fn test_never_empties_a_term() {
        let n = TermNormalizer::new();
        assert_eq!(n.normalize("District"), "District");
        assert_eq!(n.normalize("School District"), "School");
        assert_eq!(n.normalize("   district  "), "district");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = TermNormalizer::new();
        let inputs = [
            "Some Unified School District",
            "Harbor District District",
            "School District",
            "District",
            "  A   b  ",
            "Alameda Unified",
            "Hill School District School District",
        ];
        for input in inputs {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once, "not idempotent for {:?}", input);
            assert!(!once.is_empty(), "empty output for {:?}", input);
        }
    }

    #[test]
    fn test_repeated_suffixes_are_all_removed() {
        let n = TermNormalizer::new();
        assert_eq!(n.normalize("Harbor District District"), "Harbor");
    }

    #[test]
    fn test_custom_suffixes() {
        let n = TermNormalizer::with_suffixes(&["county office of education", "unified"]).unwrap();
        assert_eq!(n.normalize("Kern County Office of Education"), "Kern");
        assert_eq!(n.normalize("Manteca Unified"), "Manteca");
        // Blank entries are ignored
        let n = TermNormalizer::with_suffixes(&["  ", "district"]).unwrap();
        assert_eq!(n.normalize("Oak District"), "Oak");
    }

    #[test]
    fn test_search_term_keeps_raw() {
        let term = TermNormalizer::new().search_term("Some Unified School District");
        assert_eq!(term.raw, "Some Unified School District");
        assert_eq!(term.normalized, "Some Unified");
    }
}
