//! Follow-up query derivation.
//!
//! From the text a hop expanded, pull out the most load-bearing tokens in
//! a fixed priority order: URLs, then file-like tokens, then plain
//! identifiers. The result seeds the next hop's query alongside the
//! original one.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[\w./-]+\.(?:md|ts|tsx|js|jsx|json|py|yml|yaml|toml|sh)\b")
        .expect("file pattern")
});
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z][a-zA-Z0-9_-]{2,}\b").expect("identifier pattern"));

const MIN_TERM_LEN: usize = 4;
const MAX_TERM_LEN: usize = 80;

/// Closed stopword set for derived terms.
const DERIVE_STOPWORDS: [&str; 7] = ["http", "https", "from", "lines", "default", "true", "false"];

fn keep(term: &str) -> bool {
    let len = term.chars().count();
    if !(MIN_TERM_LEN..=MAX_TERM_LEN).contains(&len) {
        return false;
    }
    let lowered = term.to_lowercase();
    !DERIVE_STOPWORDS.contains(&lowered.as_str())
}

/// Derive a follow-up query from expanded text. Empty when nothing useful
/// was found; the recursive loop stops in that case.
#[must_use]
pub fn derive_query(expanded_text: &str, max_terms: usize) -> String {
    if max_terms == 0 || expanded_text.is_empty() {
        return String::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: &str| {
        if terms.len() >= max_terms || !keep(term) {
            return;
        }
        if seen.insert(term.to_lowercase()) {
            terms.push(term.to_string());
        }
    };

    for m in URL_RE.find_iter(expanded_text) {
        push(m.as_str());
    }
    for m in FILE_RE.find_iter(expanded_text) {
        push(m.as_str());
    }
    for m in IDENT_RE.find_iter(expanded_text) {
        push(m.as_str());
    }

    terms.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_come_before_files_before_identifiers() {
        let text = "see https://example.com/doc and config.yaml for the gateway setup";
        let derived = derive_query(text, 12);
        let terms: Vec<&str> = derived.split(' ').collect();
        assert_eq!(terms[0], "https://example.com/doc");
        assert_eq!(terms[1], "config.yaml");
        assert!(terms.contains(&"gateway"));
    }

    #[test]
    fn stopwords_and_short_terms_are_dropped() {
        let derived = derive_query("true default from lines the cat http https", 12);
        assert_eq!(derived, "");
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let derived = derive_query("gateway relay gateway relay tunnel", 12);
        assert_eq!(derived, "gateway relay tunnel");
    }

    #[test]
    fn term_cap_is_respected() {
        let text = "alpha1 beta2 gamma3 delta4 epsilon5 zeta6";
        let derived = derive_query(text, 3);
        assert_eq!(derived.split(' ').count(), 3);
    }

    #[test]
    fn empty_text_derives_nothing() {
        assert_eq!(derive_query("", 12), "");
        assert_eq!(derive_query("words here", 0), "");
    }
}
