//! Preview shaping and the binary-blob safety filter.

use recall_protocol::truncate_to_chars;

/// Minimum run length for the base64-ish blob heuristic.
const BLOB_MIN_LEN: usize = 40;

/// Whitespace-normalise a snippet and cut it to `preview_chars`, with a
/// trailing ellipsis when the cut bit.
#[must_use]
pub fn make_preview(snippet: &str, preview_chars: usize) -> String {
    let normalised = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalised.chars().count() <= preview_chars {
        return normalised;
    }
    let reserve = preview_chars.saturating_sub(1).max(1);
    let mut out = truncate_to_chars(&normalised, reserve).to_string();
    out.push('…');
    out
}

/// Refs whose preview is an unbroken base64-alphabet run (or carries the
/// Unicode replacement character) are dropped: expanding them floods the
/// context window with bytes that carry no retrievable information.
#[must_use]
pub fn looks_like_blob(preview: &str) -> bool {
    if preview.contains('\u{FFFD}') {
        return true;
    }
    preview.chars().count() >= BLOB_MIN_LEN
        && !preview.chars().any(char::is_whitespace)
        && preview
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
}
