//! Tool-surface defaults. Compatibility-sensitive: clients rely on these.

/// Preview length for refs-first results.
pub const PREVIEW_CHARS: usize = 140;

/// Window length when an expand request carries no explicit range.
pub const EXPAND_DEFAULT_LINES: usize = 60;

/// Window length used by the recursive loop's own expansions.
pub const RECURSIVE_DEFAULT_LINES: usize = 20;

/// How many refs a single expand call will read.
pub const MAX_REFS: usize = 2;

/// Per-ref char budget.
pub const MAX_CHARS_PER_REF: usize = 8_000;

/// Hard clamp on any requested window height.
pub const MAX_LINES_PER_WINDOW: usize = 400;

pub const RECURSIVE_MAX_HOPS: u32 = 1;
pub const MAX_REFS_PER_HOP: usize = 8;
pub const EXPAND_TOP_K: usize = 2;
pub const MAX_TOTAL_EXPANDED_CHARS: usize = 12_000;
pub const DERIVED_QUERY_MAX_TERMS: usize = 12;

/// Default result count for the search operations.
pub const MAX_RESULTS: usize = 10;
