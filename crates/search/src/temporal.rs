//! Natural-language time references → inclusive date ranges.
//!
//! "what did we discuss yesterday about auth?" carries both a temporal
//! constraint and a topic; this module pulls out the constraint so the
//! engine can restrict candidates before the expensive matching tier.

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Inclusive ISO date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Whether an ISO `YYYY-MM-DD`-prefixed date string falls in the range.
    /// Unparseable dates never match.
    #[must_use]
    pub fn contains(&self, iso_date: &str) -> bool {
        iso_date
            .get(0..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .is_some_and(|date| date >= self.start && date <= self.end)
    }
}

static DAYS_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+|one|two|three|four|five|six|seven|eight|nine|ten|a|an|couple)\s*days?\s*ago\b").expect("days-ago pattern"));
static WEEKS_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+|one|two|three|four|five|six|seven|eight|nine|ten|a|an|couple)\s*weeks?\s*ago\b").expect("weeks-ago pattern"));

fn word_to_num(word: &str) -> u64 {
    match word {
        "one" | "a" | "an" => 1,
        "two" | "couple" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        other => other.parse().unwrap_or(1),
    }
}

/// Parse a temporal phrase out of `query` relative to `reference`.
///
/// Returns `None` when the query carries no recognised time reference.
#[must_use]
pub fn parse_temporal_phrase(query: &str, reference: NaiveDate) -> Option<DateRange> {
    let q = query.to_lowercase();
    let back = |days: u64| reference.checked_sub_days(Days::new(days)).unwrap_or(reference);

    if q.contains("yesterday") {
        return Some(DateRange::single(back(1)));
    }
    if q.contains("today") || q.contains("tonight") || q.contains("this morning") {
        return Some(DateRange::single(reference));
    }
    if q.contains("the other day") || q.contains("a few days ago") {
        return Some(DateRange {
            start: back(3),
            end: back(1),
        });
    }
    if let Some(captures) = DAYS_AGO.captures(&q) {
        let n = word_to_num(&captures[1]);
        return Some(DateRange::single(back(n)));
    }
    if q.contains("last week") {
        let weekday = u64::from(reference.weekday().num_days_from_monday());
        return Some(DateRange {
            start: back(weekday + 7),
            end: back(weekday + 1),
        });
    }
    if q.contains("this week") {
        let weekday = u64::from(reference.weekday().num_days_from_monday());
        return Some(DateRange {
            start: back(weekday),
            end: reference,
        });
    }
    if let Some(captures) = WEEKS_AGO.captures(&q) {
        let n = word_to_num(&captures[1]);
        // A week-granular reference is fuzzy; allow a week either side.
        return Some(DateRange {
            start: back(n * 7 + 7),
            end: back(n.saturating_sub(1) * 7),
        });
    }
    if q.contains("last month") {
        return Some(DateRange {
            start: back(60),
            end: back(28),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 15).expect("valid date") // a Wednesday
    }

    #[test]
    fn yesterday_and_today() {
        let range = parse_temporal_phrase("what did we discuss yesterday?", reference())
            .expect("range");
        assert_eq!(range.start.to_string(), "2026-07-14");
        assert_eq!(range.end.to_string(), "2026-07-14");

        let range = parse_temporal_phrase("today's deploy status", reference()).expect("range");
        assert_eq!(range, DateRange::single(reference()));
    }

    #[test]
    fn numeric_and_word_form_days_ago() {
        let range = parse_temporal_phrase("3 days ago", reference()).expect("range");
        assert_eq!(range.start.to_string(), "2026-07-12");

        let range = parse_temporal_phrase("two days ago we fixed it", reference()).expect("range");
        assert_eq!(range.start.to_string(), "2026-07-13");
    }

    #[test]
    fn week_ranges_follow_the_calendar() {
        let range = parse_temporal_phrase("last week's work on wlxc", reference()).expect("range");
        assert_eq!(range.start.to_string(), "2026-07-06");
        assert_eq!(range.end.to_string(), "2026-07-12");

        let range = parse_temporal_phrase("this week", reference()).expect("range");
        assert_eq!(range.start.to_string(), "2026-07-13");
        assert_eq!(range.end, reference());
    }

    #[test]
    fn plain_queries_have_no_range() {
        assert_eq!(parse_temporal_phrase("glicko rating drift", reference()), None);
    }

    #[test]
    fn contains_requires_parseable_iso_date() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2026, 7, 1).expect("date"),
            end: NaiveDate::from_ymd_opt(2026, 7, 31).expect("date"),
        };
        assert!(range.contains("2026-07-15"));
        assert!(range.contains("2026-07-15T09:30:00Z"));
        assert!(!range.contains("2026-08-01"));
        assert!(!range.contains("mid July"));
    }
}
