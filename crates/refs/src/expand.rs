//! Lazy expansion of refs into bounded text windows.
//!
//! Budgets are never errors: a window that exceeds its char budget is cut
//! and marked, a batch that exceeds `max_refs` loses refs from the tail,
//! and an exhausted global budget skips the remaining refs. Only genuinely
//! broken input (missing path, traversal, empty range) produces a per-ref
//! failure, and sibling refs still succeed.

use crate::store::{FileStore, StoreError};
use recall_protocol::{
    apply_char_budget, defaults, ExpandBudget, ExpandFailure, ExpandRequestRef, ExpandResult,
    ExpandedWindow,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    pub default_lines: usize,
    pub max_refs: usize,
    pub max_chars: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            default_lines: defaults::EXPAND_DEFAULT_LINES,
            max_refs: defaults::MAX_REFS,
            max_chars: defaults::MAX_CHARS_PER_REF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpandOutcome {
    pub results: Vec<ExpandResult>,
    pub budget: ExpandBudget,
}

#[derive(Clone)]
pub struct ExpandEngine {
    store: Arc<dyn FileStore>,
}

impl ExpandEngine {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Expand a batch of refs under per-ref budgets only.
    #[must_use]
    pub fn expand(&self, refs: &[ExpandRequestRef], options: &ExpandOptions) -> ExpandOutcome {
        let mut unlimited = usize::MAX;
        self.expand_with_global_budget(refs, options, &mut unlimited)
    }

    /// Expand under per-ref budgets plus a shared global char budget. The
    /// budget counter is decremented by the chars actually emitted; once it
    /// cannot cover another window the remaining refs are skipped.
    #[must_use]
    pub fn expand_with_global_budget(
        &self,
        refs: &[ExpandRequestRef],
        options: &ExpandOptions,
        global_remaining: &mut usize,
    ) -> ExpandOutcome {
        let budget = ExpandBudget {
            max_refs: options.max_refs,
            default_lines: options.default_lines,
            max_chars: options.max_chars,
        };

        // `max_refs = 0` means no expansion at all: no reads, no results.
        if options.max_refs == 0 {
            return ExpandOutcome {
                results: Vec::new(),
                budget,
            };
        }

        let mut results = Vec::new();
        for request in refs.iter().take(options.max_refs) {
            if *global_remaining == 0 {
                break;
            }
            match self.expand_one(request, options) {
                Ok(mut window) => {
                    let emitted = window.text.chars().count();
                    if emitted > *global_remaining {
                        let (text, _) = apply_char_budget(&window.text, *global_remaining);
                        window.text = text;
                        *global_remaining = 0;
                    } else {
                        *global_remaining -= emitted;
                    }
                    results.push(ExpandResult::Window(window));
                }
                Err(error) => results.push(ExpandResult::Failure(ExpandFailure {
                    path: request.path.clone(),
                    error,
                })),
            }
        }

        ExpandOutcome { results, budget }
    }

    fn expand_one(
        &self,
        request: &ExpandRequestRef,
        options: &ExpandOptions,
    ) -> std::result::Result<ExpandedWindow, String> {
        let text = self.store.read_file(&request.path).map_err(|err| match err {
            StoreError::NotFound(path) => format!("file not found: {path}"),
            other => other.to_string(),
        })?;

        let file_lines: Vec<&str> = text.lines().collect();
        if file_lines.is_empty() {
            return Err("file has no lines".to_string());
        }

        let from = request.from.or(request.start_line).unwrap_or(1);
        let lines = request
            .lines
            .or_else(|| match (request.start_line, request.end_line) {
                (Some(start), Some(end)) if end >= start => Some(end - start + 1),
                _ => None,
            })
            .unwrap_or(options.default_lines);

        let lines = lines.clamp(1, defaults::MAX_LINES_PER_WINDOW);
        let from = from.clamp(1, file_lines.len());

        let slice = &file_lines[from - 1..file_lines.len().min(from - 1 + lines)];
        let joined = slice.join("\n");
        let (text, _) = apply_char_budget(&joined, options.max_chars);

        Ok(ExpandedWindow {
            path: request.path.clone(),
            from,
            lines: slice.len(),
            text,
        })
    }
}
