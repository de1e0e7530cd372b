//! Concept expansion: a closed map from concept keys to related terms.
//!
//! This is deliberately a small static vocabulary, not a learned model; the
//! enhanced matcher uses it to bridge queries like "auth" to transcripts
//! that only ever said "oauth" or "jwt".

use std::collections::HashMap;
use std::sync::LazyLock;

static CONCEPT_INDEX: LazyLock<HashMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| {
        let entries: &[(&str, &[&str])] = &[
            // Rating systems
            ("glicko", &["rating", "chess", "elo", "leaderboard", "rank", "score"]),
            ("elo", &["rating", "glicko", "chess", "rank", "score"]),
            // Retrieval domain
            ("rlm", &["memory", "retrieval", "search", "context", "transcript"]),
            ("jsonl", &["transcript", "session", "log", "file"]),
            // Auth / security
            ("oauth", &["auth", "authentication", "token", "login", "security"]),
            ("jwt", &["token", "auth", "authentication", "bearer"]),
            ("ssl", &["tls", "certificate", "encryption", "secure"]),
            ("tls", &["ssl", "certificate", "encryption", "secure"]),
            // Platforms
            ("whatsapp", &["message", "chat", "channel", "phone"]),
            ("telegram", &["message", "chat", "channel", "bot"]),
            ("discord", &["message", "chat", "channel", "server", "guild"]),
            ("slack", &["message", "chat", "channel", "workspace"]),
            // Languages / formats
            ("typescript", &["javascript", "node", "code"]),
            ("python", &["script", "code"]),
            ("markdown", &["readme", "docs", "documentation"]),
            // Infrastructure
            ("k8s", &["kubernetes", "container", "pod", "deployment", "cluster"]),
            ("kubernetes", &["k8s", "container", "pod", "deployment", "cluster"]),
            ("docker", &["container", "image", "dockerfile", "compose"]),
            ("cicd", &["pipeline", "deploy", "build", "actions"]),
            // Testing
            ("e2e", &["playwright", "cypress", "test", "browser"]),
            ("unit", &["test", "jest", "pytest", "mock"]),
            // Frontend
            ("css", &["style", "stylesheet", "tailwind", "sass"]),
            ("react", &["component", "jsx", "tsx", "hooks", "state"]),
        ];
        entries.iter().copied().collect()
    });

const MAX_RELATED: usize = 5;

/// Related terms for `term`: direct lookup first, otherwise the concepts
/// whose related sets mention it. Capped at five terms either way.
#[must_use]
pub fn related_concepts(term: &str) -> Vec<&'static str> {
    let term = term.to_lowercase();

    if let Some(related) = CONCEPT_INDEX.get(term.as_str()) {
        return related.iter().copied().take(MAX_RELATED).collect();
    }

    let mut out = Vec::new();
    for (concept, related) in CONCEPT_INDEX.iter() {
        if related.contains(&term.as_str()) {
            if !out.contains(concept) {
                out.push(*concept);
            }
            for other in related.iter().filter(|t| **t != term) {
                if !out.contains(other) {
                    out.push(other);
                }
            }
        }
    }
    out.sort_unstable();
    out.truncate(MAX_RELATED);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_lookup_returns_related_set() {
        let related = related_concepts("glicko");
        assert!(related.contains(&"rating"));
        assert!(related.contains(&"elo"));
        assert!(related.len() <= MAX_RELATED);
    }

    #[test]
    fn reverse_lookup_finds_owning_concepts() {
        let related = related_concepts("bearer");
        assert!(related.contains(&"jwt"));
    }

    #[test]
    fn unknown_terms_expand_to_nothing() {
        assert!(related_concepts("zzzzxq").is_empty());
    }
}
