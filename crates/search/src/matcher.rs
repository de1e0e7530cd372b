//! Enhanced lexical matcher.
//!
//! Four strategies, cheapest first: exact/substring containment, compound
//! splitting of the query term, Levenshtein ≤ 2 fuzzy matching, and concept
//! expansion. Per-message work is capped so a pathological transcript
//! cannot blow up a query: at most [`MAX_CONTENT_WORDS`] content words are
//! considered, with the substring and fuzzy scans further limited to
//! [`MAX_SUBSTRING_SCAN`] and [`MAX_FUZZY_SCAN`] words.

use crate::concepts::related_concepts;
use recall_indexer::tokenize::{is_stopword, split_compound};

/// Content words examined per message batch.
pub const MAX_CONTENT_WORDS: usize = 2_000;
/// Words scanned for substring containment.
pub const MAX_SUBSTRING_SCAN: usize = 1_000;
/// Words scanned for fuzzy matches.
pub const MAX_FUZZY_SCAN: usize = 500;

const MIN_SUBSTRING_LEN: usize = 3;

/// A query term with its scoring weight. Rare, technical-looking terms
/// weigh more than common prose words. `parts` carries the compound split
/// of the original (case-preserving) word, since the lowercased `term` no
/// longer shows camel boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
    pub parts: Vec<String>,
}

/// Extract up to `max_terms` weighted terms from a query.
#[must_use]
pub fn weighted_query_terms(query: &str, max_terms: usize) -> Vec<WeightedTerm> {
    let mut out: Vec<WeightedTerm> = Vec::new();
    for word in query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
    {
        let lowered = word.to_lowercase();
        if lowered.len() < 3 || is_stopword(&lowered) {
            continue;
        }
        if out.iter().any(|t| t.term == lowered) {
            continue;
        }
        out.push(WeightedTerm {
            weight: word_weight(word),
            parts: split_compound(word),
            term: lowered,
        });
    }
    out.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(max_terms);
    out
}

/// Weight heuristic: technical-looking tokens (digits, separators, mixed
/// case, short project-name-shaped words) score higher than prose.
fn word_weight(word: &str) -> f64 {
    let lowered = word.to_lowercase();
    if is_stopword(&lowered) {
        return 0.3;
    }
    if lowered.len() <= 3 {
        return 0.5;
    }
    if word.chars().any(|c| c.is_ascii_digit() || c == '_' || c == '-') {
        return 2.0;
    }
    let has_inner_upper = word
        .as_bytes()
        .windows(2)
        .any(|w| w[0].is_ascii_lowercase() && w[1].is_ascii_uppercase());
    if has_inner_upper || word.chars().next().is_some_and(char::is_uppercase) {
        return 1.5;
    }
    if (4..=6).contains(&lowered.len()) {
        return 1.5;
    }
    1.0
}

/// Levenshtein edit distance, single-row DP.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let insertions = prev[j + 1] + 1;
            let deletions = current[j] + 1;
            let substitutions = prev[j] + usize::from(ca != cb);
            current.push(insertions.min(deletions).min(substitutions));
        }
        prev = current;
    }
    prev[b.len()]
}

/// Conservative fuzzy equality: both words ≥ 4 chars, shared 2-char prefix,
/// distance 1 for words up to 6 chars and 2 beyond that. The prefix guard
/// keeps `pods`/`post` and `dart`/`date` apart.
#[must_use]
pub fn fuzzy_match(query_word: &str, content_word: &str) -> bool {
    let q = query_word.to_lowercase();
    let c = content_word.to_lowercase();
    if q == c {
        return true;
    }
    if q.chars().count() < 4 || c.chars().count() < 4 {
        return false;
    }
    let q_prefix: String = q.chars().take(2).collect();
    let c_prefix: String = c.chars().take(2).collect();
    if q_prefix != c_prefix {
        return false;
    }
    let max_distance = if q.chars().count() <= 6 { 1 } else { 2 };
    let len_gap = q.chars().count().abs_diff(c.chars().count());
    if len_gap > max_distance {
        return false;
    }
    levenshtein(&q, &c) <= max_distance
}

/// Query-in-content substring test; never the reverse, so `and` cannot
/// match `cassandra`.
#[must_use]
pub fn substring_match(query_word: &str, content_word: &str) -> bool {
    let q = query_word.to_lowercase();
    if q.len() < MIN_SUBSTRING_LEN {
        return false;
    }
    content_word.to_lowercase().contains(&q)
}

fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|w| w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
        .take(MAX_CONTENT_WORDS)
        .map(str::to_lowercase)
        .collect()
}

/// Score one message against the weighted terms.
///
/// Strategy scores per matched term (before weighting): exact containment
/// 2.0 plus an occurrence bonus capped at 1.5 and a word-boundary bonus of
/// 0.5; compound-split hit 1.8; substring hit 1.5; fuzzy hit 1.0; concept
/// hit 1.8. The total is normalised by term count (scaled back up to at
/// most 3 terms), and a verbatim appearance of the whole query adds 3.0.
#[must_use]
pub fn score_message(text: &str, terms: &[WeightedTerm], original_query: &str) -> f64 {
    if text.is_empty() || terms.is_empty() {
        return 0.0;
    }

    let text_lower = text.to_lowercase();
    let words = content_words(text);
    let mut score = 0.0;

    for term in terms {
        score += term.weight * term_score(term, &text_lower, &words);
    }

    // Normalise so long queries do not dominate short ones.
    let n = terms.len() as f64;
    score = score / n * n.min(3.0);

    if exact_phrase(original_query, &text_lower) {
        score += 3.0;
    }
    score
}

fn term_score(term: &WeightedTerm, text_lower: &str, words: &[String]) -> f64 {
    let t = term.term.as_str();

    if text_lower.contains(t) {
        let count = text_lower.matches(t).count() as f64;
        let boundary = words.iter().any(|w| w == t);
        return 2.0 + (count * 0.3).min(1.5) + if boundary { 0.5 } else { 0.0 };
    }

    // Compound splits of the query term against whole content words.
    if term.parts.len() > 1 && term.parts.iter().all(|p| words.iter().any(|w| w == p)) {
        return 1.8;
    }

    if words
        .iter()
        .take(MAX_SUBSTRING_SCAN)
        .any(|w| substring_match(t, w))
    {
        return 1.5;
    }

    if words.iter().take(MAX_FUZZY_SCAN).any(|w| fuzzy_match(t, w)) {
        return 1.0;
    }

    for related in related_concepts(t) {
        if text_lower.contains(related) {
            return 1.8;
        }
    }

    0.0
}

fn exact_phrase(query: &str, text_lower: &str) -> bool {
    let normalised: String = query.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    if normalised.len() < 8 || !normalised.contains(' ') {
        return false;
    }
    let haystack: String = text_lower.split_whitespace().collect::<Vec<_>>().join(" ");
    haystack.contains(&normalised)
}

/// Snippet centred on the first keyword hit: 100 chars of lead-in, 400 of
/// follow-on, ellipsis on cut edges.
#[must_use]
pub fn extract_snippet(text: &str, terms: &[WeightedTerm], max_len: usize) -> String {
    let text_lower = text.to_lowercase();
    let hit = terms
        .iter()
        .filter_map(|t| text_lower.find(&t.term))
        .min();

    let Some(pos) = hit else {
        let cut = floor_char_boundary(text, max_len);
        let mut out = text[..cut].trim().to_string();
        if cut < text.len() {
            out.push('…');
        }
        return out;
    };

    let start = floor_char_boundary(text, pos.saturating_sub(100));
    let end = floor_char_boundary(text, (pos + 400).min(text.len()));
    let mut snippet = text[start..end].trim().to_string();
    if start > 0 {
        snippet.insert(0, '…');
    }
    if end < text.len() {
        snippet.push('…');
    }
    snippet
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn terms(query: &str) -> Vec<WeightedTerm> {
        weighted_query_terms(query, 5)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn fuzzy_requires_shared_prefix() {
        assert!(fuzzy_match("postgres", "postgresql"));
        assert!(fuzzy_match("tokeniser", "tokenizer"));
        assert!(!fuzzy_match("pods", "post"));
        assert!(!fuzzy_match("dart", "date"));
        assert!(!fuzzy_match("abc", "abd"));
    }

    #[test]
    fn substring_is_one_directional() {
        assert!(substring_match("app", "appdata"));
        assert!(!substring_match("cassandra", "and"));
        assert!(!substring_match("an", "anything"));
    }

    #[test]
    fn exact_match_outscores_fuzzy() {
        let t = terms("glicko");
        let exact = score_message("we tuned the glicko parameters", &t, "glicko");
        let fuzzy = score_message("we tuned the glicka parameters", &t, "glicko");
        assert!(exact > fuzzy);
        assert!(fuzzy > 0.0);
    }

    #[test]
    fn compound_query_matches_split_content() {
        let t = terms("HostWindows");
        // "HostWindows" term is lowercased to "hostwindows"; the content
        // carries the split words.
        let score = score_message("the host windows container path", &t, "HostWindows");
        assert!(score > 0.0);
    }

    #[test]
    fn concept_expansion_bridges_vocabulary() {
        let t = terms("glicko");
        let score = score_message("the rating leaderboard shifted", &t, "glicko");
        assert!(score > 0.0);
    }

    #[test]
    fn exact_phrase_bonus_applies() {
        let t = terms("deploy pipeline retry");
        let with_phrase = score_message(
            "we should deploy pipeline retry logic next week",
            &t,
            "deploy pipeline retry",
        );
        let without_phrase = score_message(
            "retry logic for the pipeline deploy is ready",
            &t,
            "deploy pipeline retry",
        );
        assert!(with_phrase > without_phrase);
    }

    #[test]
    fn weights_favour_technical_terms() {
        let t = weighted_query_terms("what about the wlxc-runtime issue", 5);
        assert_eq!(t[0].term, "wlxc-runtime");
        assert!(t[0].weight >= 2.0);
    }

    #[test]
    fn snippet_centres_on_first_hit() {
        let lead = "x".repeat(300);
        let text = format!("{lead} glicko appears here and the tail continues for a while");
        let snippet = extract_snippet(&text, &terms("glicko"), 500);
        assert!(snippet.contains("glicko"));
        assert!(snippet.starts_with('…'));
    }

    #[test]
    fn snippet_falls_back_to_prefix() {
        let text = "no keyword in this text at all";
        let snippet = extract_snippet(text, &terms("glicko"), 10);
        assert!(snippet.ends_with('…'));
    }
}
