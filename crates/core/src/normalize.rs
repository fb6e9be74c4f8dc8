//! Field normalization shared by every matcher.
//!
//! All functions here are total: malformed input degrades to a neutral value
//! (zero amount, unknown date, empty reference) instead of failing the run.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::money::Money;

/// Characters of a reference kept for fuzzy comparison.
pub const REFERENCE_TAIL_LEN: usize = 6;

const SPANISH_MONTHS: &[(&str, u32)] = &[
    ("ENE", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("ABR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AGO", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DIC", 12),
];

/// Parses a locale-ambiguous amount, returning `None` when nothing numeric
/// can be recovered.
///
/// When both `,` and `.` appear, whichever comes last is the decimal
/// separator. A lone separator occurring once is decimal; repeated, it is a
/// thousands separator.
pub fn try_parse_amount(raw: &str) -> Option<Money> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (negative, body) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    let canonical = match (body.rfind(','), body.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => body.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => body.replace(',', ""),
        (Some(_), None) if body.matches(',').count() == 1 => body.replace(',', "."),
        (Some(_), None) => body.replace(',', ""),
        (None, Some(_)) if body.matches('.').count() > 1 => body.replace('.', ""),
        _ => body.to_string(),
    };

    let value = Decimal::from_str(&canonical).ok()?;
    Some(Money::new(if negative { -value } else { value }))
}

/// Locale-tolerant amount parsing that never fails: unparseable input is zero.
pub fn normalize_amount(raw: &str) -> Money {
    try_parse_amount(raw).unwrap_or_default()
}

/// Last `n` characters of `s` (all of it when shorter).
pub fn tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &s[start..]
}

/// Canonical reference for comparison: trimmed, without the `.0` left behind
/// by spreadsheet float export, reduced to its last `tail_len` characters.
pub fn normalize_reference(raw: &str, tail_len: usize) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    tail(trimmed, tail_len).to_string()
}

/// Tries `DD/MM/YYYY`, then `DD-MON-YYYY` (Spanish or English month
/// abbreviations), then ISO `YYYY-MM-DD`. A trailing time component is
/// ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.split_whitespace().next()?;
    if s.len() < 5 {
        return None;
    }

    if s.contains('/') {
        return NaiveDate::parse_from_str(s, "%d/%m/%Y").ok();
    }

    parse_month_name_date(s).or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_month_name_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('-').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if !month.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let upper = month.to_ascii_uppercase();
    if let Some((_, number)) = SPANISH_MONTHS.iter().find(|(name, _)| *name == upper) {
        let day: u32 = day.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, *number, day);
    }

    NaiveDate::parse_from_str(s, "%d-%b-%Y").ok()
}

/// Collapses whitespace runs and the doubled `MOVIL MOVIL` left by statement
/// extraction.
pub fn clean_description(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("MOVIL MOVIL", "MOVIL")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> String {
        normalize_amount(s).to_string()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── amounts ───────────────────────────────────────────────────────────────

    #[test]
    fn amount_plain_dot_decimal() {
        assert_eq!(amount("150.20"), "150.20");
        assert_eq!(amount("100"), "100.00");
    }

    #[test]
    fn amount_comma_decimal() {
        assert_eq!(amount("150,20"), "150.20");
    }

    #[test]
    fn amount_european_thousands() {
        assert_eq!(amount("1.234,56"), "1234.56");
        assert_eq!(amount("12.345.678,90"), "12345678.90");
    }

    #[test]
    fn amount_us_thousands() {
        assert_eq!(amount("1,234.56"), "1234.56");
        assert_eq!(amount("1,234,567"), "1234567.00");
    }

    #[test]
    fn amount_repeated_dot_is_thousands() {
        assert_eq!(amount("1.234.567"), "1234567.00");
    }

    #[test]
    fn amount_strips_quotes_and_spaces() {
        assert_eq!(amount("\"1.500,00\""), "1500.00");
        assert_eq!(amount(" '42,10' "), "42.10");
    }

    #[test]
    fn amount_negative_forms() {
        assert_eq!(amount("-50,00"), "-50.00");
        assert_eq!(amount("(75.25)"), "-75.25");
    }

    #[test]
    fn amount_garbage_is_zero() {
        assert_eq!(amount(""), "0.00");
        assert_eq!(amount("FIN"), "0.00");
        assert_eq!(amount("n/a"), "0.00");
        assert!(try_parse_amount("FIN").is_none());
    }

    // ── references ────────────────────────────────────────────────────────────

    #[test]
    fn reference_keeps_tail() {
        assert_eq!(normalize_reference("000123456789", 6), "456789");
        assert_eq!(normalize_reference("  4567 ", 6), "4567");
    }

    #[test]
    fn reference_strips_float_artifact() {
        assert_eq!(normalize_reference("123456789.0", 6), "456789");
        assert_eq!(normalize_reference("10.05", 6), "10.05");
    }

    #[test]
    fn tail_handles_multibyte() {
        assert_eq!(tail("añoñoño", 3), "oño");
        assert_eq!(tail("ab", 5), "ab");
    }

    // ── dates ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_slash_day_first() {
        assert_eq!(parse_date("10/06/2025"), Some(date(2025, 6, 10)));
        assert_eq!(parse_date("3/6/2025"), Some(date(2025, 6, 3)));
    }

    #[test]
    fn date_spanish_month_name() {
        assert_eq!(parse_date("03-JUN-2025"), Some(date(2025, 6, 3)));
        assert_eq!(parse_date("15-ago-2025"), Some(date(2025, 8, 15)));
        assert_eq!(parse_date("02-DIC-2024"), Some(date(2024, 12, 2)));
    }

    #[test]
    fn date_english_month_name() {
        assert_eq!(parse_date("05-Aug-2025"), Some(date(2025, 8, 5)));
    }

    #[test]
    fn date_iso_with_time() {
        assert_eq!(parse_date("2025-06-10"), Some(date(2025, 6, 10)));
        assert_eq!(parse_date("2025-06-10 00:00:00"), Some(date(2025, 6, 10)));
    }

    #[test]
    fn date_failures_are_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Ver"), None);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("10-XYZ-2025"), None);
    }

    // ── descriptions ──────────────────────────────────────────────────────────

    #[test]
    fn description_cleanup() {
        assert_eq!(
            clean_description("  PAGO   MOVIL MOVIL\nBANCO "),
            "PAGO MOVIL BANCO"
        );
    }
}
