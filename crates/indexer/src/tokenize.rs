//! Shared tokenisation contract.
//!
//! The same function runs at index time and query time; retrieval correctness
//! depends on both sides producing identical output for identical input.
//! No stemming.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Minimum token length kept by the tokeniser.
pub const MIN_TOKEN_LEN: usize = 3;

/// Common English words plus transcript-domain noise. Roughly a hundred
/// entries; tokens in this set never reach the index or the query pipeline.
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
        "our", "out", "has", "have", "been", "will", "more", "when", "who", "which", "their",
        "what", "there", "from", "this", "that", "with", "they", "them", "then", "than", "some",
        "could", "would", "should", "may", "might", "must", "just", "also", "very", "really",
        "about", "into", "over", "only", "other", "such", "each", "most", "many", "much", "like",
        "want", "need", "know", "think", "make", "made", "take", "took", "come", "came", "say",
        "said", "tell", "told", "get", "got", "use", "used", "using", "work", "thing", "things",
        "time", "year", "day", "way", "well", "back", "even", "new", "good", "look", "see", "now",
        "here", "where", "why", "how", "did", "does", "doing", "done", "being", "because", "these",
        "those", "its", "his", "him", "she", "were", "your", "yours", "http", "https", "json",
        "null",
    ]
    .into_iter()
    .collect()
});

/// Tokenise `text` into search terms.
///
/// Lowercases, splits on non-alphanumeric characters plus kebab/snake/camel
/// boundaries (`foo-bar` → `foo, bar`; `readMessage` → `read, message`),
/// drops tokens shorter than [`MIN_TOKEN_LEN`] and stopwords. Returns the
/// full multiset in input order; callers dedup when they need a set.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in words(text) {
        for part in split_compound(word) {
            if part.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(part.as_str()) {
                out.push(part);
            }
        }
    }
    out
}

/// Tokenise and dedup, preserving first-seen order.
#[must_use]
pub fn token_set(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[must_use]
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Maximal runs of `[A-Za-z0-9_-]` that start with a letter.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
}

/// Split one word on kebab/snake separators and camel-case boundaries.
///
/// `HostWindowsContainer` → `host, windows, container`;
/// `getHTTPResponse` → `get, http, response`.
#[must_use]
pub fn split_compound(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for token in word.split(['-', '_']) {
        if token.is_empty() {
            continue;
        }
        let chars: Vec<char> = token.chars().collect();
        let mut start = 0;
        for i in 1..chars.len() {
            let prev = chars[i - 1];
            let cur = chars[i];
            let lower_to_upper = prev.is_lowercase() && cur.is_uppercase();
            // Acronym boundary: `HTTPResponse` splits before `Response`.
            let acronym_end = prev.is_uppercase()
                && cur.is_uppercase()
                && chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if lower_to_upper || acronym_end {
                parts.push(chars[start..i].iter().collect::<String>().to_lowercase());
                start = i;
            }
        }
        parts.push(chars[start..].iter().collect::<String>().to_lowercase());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_kebab_snake_and_camel() {
        assert_eq!(split_compound("foo-bar"), vec!["foo", "bar"]);
        assert_eq!(split_compound("snake_case"), vec!["snake", "case"]);
        assert_eq!(split_compound("readMessage"), vec!["read", "message"]);
        assert_eq!(
            split_compound("HostWindowsContainer"),
            vec!["host", "windows", "container"]
        );
        assert_eq!(
            split_compound("getHTTPResponse"),
            vec!["get", "http", "response"]
        );
    }

    #[test]
    fn drops_short_tokens_and_stopwords() {
        let tokens = tokenize("the quick fix for a db error");
        assert_eq!(tokens, vec!["quick", "fix", "error"]);
    }

    #[test]
    fn keeps_domain_terms_and_lowercases() {
        let tokens = tokenize("Debugging OAuth-token refresh in sessionStore");
        assert_eq!(
            tokens,
            vec!["debugging", "oauth", "token", "refresh", "session", "store"]
        );
    }

    #[test]
    fn tokenisation_is_deterministic() {
        let text = "IndexMaintainer rebuilds posting-lists after transcriptUpdate events";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn token_set_dedups_preserving_order() {
        let tokens = token_set("alpha beta alpha gamma beta");
        assert_eq!(tokens, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn numeric_leading_words_are_ignored() {
        assert_eq!(tokenize("123abc 4xy"), Vec::<String>::new());
        assert_eq!(tokenize("abc123"), vec!["abc123"]);
    }
}
