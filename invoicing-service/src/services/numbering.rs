//! Invoice number generation from a profile's numbering template.
//!
//! Supported placeholders:
//!
//! | placeholder | value                                 |
//! |-------------|---------------------------------------|
//! | `{YYYY}`    | four-digit year                       |
//! | `{YY}`      | last two digits of the year           |
//! | `{MM}`      | two-digit month                       |
//! | `{DD}`      | two-digit day                         |
//! | `{N..N}`    | counter, zero-padded to the N count   |
//!
//! Date placeholders are substituted everywhere they occur. Only the first
//! counter placeholder is substituted; a template without one yields the
//! template with dates filled in.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static COUNTER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{N+\}").expect("counter placeholder pattern is valid"));

/// Render `format` for sequence value `counter` on date `now`.
pub fn generate_number(format: &str, counter: u64, now: NaiveDate) -> String {
    let dated = format
        .replace("{YYYY}", &format!("{:04}", now.year()))
        .replace("{YY}", &format!("{:02}", now.year().rem_euclid(100)))
        .replace("{MM}", &format!("{:02}", now.month()))
        .replace("{DD}", &format!("{:02}", now.day()));

    COUNTER_PLACEHOLDER
        .replacen(&dated, 1, |caps: &Captures| {
            let width = caps[0].len() - 2;
            format!("{:0width$}", counter, width = width)
        })
        .into_owned()
}

/// Whether `format` contains a counter placeholder.
pub fn has_counter_placeholder(format: &str) -> bool {
    COUNTER_PLACEHOLDER.is_match(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pads_counter_to_placeholder_width() {
        assert_eq!(
            generate_number("FV/{YYYY}/{NNN}", 7, date(2025, 3, 1)),
            "FV/2025/007"
        );
    }

    #[test]
    fn fills_month_and_short_counter() {
        assert_eq!(
            generate_number("FV/{YYYY}/{MM}/{NN}", 3, date(2025, 1, 5)),
            "FV/2025/01/03"
        );
    }

    #[test]
    fn fills_short_year_and_day() {
        assert_eq!(
            generate_number("{YY}{MM}{DD}-{NNNN}", 42, date(2024, 12, 9)),
            "241209-0042"
        );
    }

    #[test]
    fn counter_wider_than_placeholder_is_not_truncated() {
        assert_eq!(generate_number("INV-{NN}", 1234, date(2025, 6, 1)), "INV-1234");
    }

    #[test]
    fn template_without_counter_only_fills_dates() {
        assert_eq!(generate_number("FV/{YYYY}/{MM}", 9, date(2025, 6, 1)), "FV/2025/06");
        assert!(!has_counter_placeholder("FV/{YYYY}/{MM}"));
    }

    #[test]
    fn only_first_counter_placeholder_is_substituted() {
        assert_eq!(
            generate_number("{NNN}-{NN}", 5, date(2025, 6, 1)),
            "005-{NN}"
        );
    }

    #[test]
    fn four_digit_year_takes_precedence_over_short_year() {
        assert_eq!(generate_number("{YYYY}|{YY}", 1, date(2031, 1, 1)), "2031|31");
    }

    #[test]
    fn same_inputs_give_same_output() {
        let now = date(2025, 3, 1);
        assert_eq!(
            generate_number("FV/{YYYY}/{NNN}", 12, now),
            generate_number("FV/{YYYY}/{NNN}", 12, now)
        );
    }
}
