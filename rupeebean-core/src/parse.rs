//! Amount and date parsing shared by the statement parsers.

use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrCr {
    Debit,
    Credit,
}

/// How to read an ambiguous numeric date such as `03/04/2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

const CURRENCY_MARKERS: [&str; 5] = ["₹", "Rs.", "Rs", "INR", "`"];

/// Split a trailing `Cr`/`Dr` marker (any case) off an amount cell.
pub fn split_drcr(raw: &str) -> (&str, Option<DrCr>) {
    let s = raw.trim();
    if s.len() >= 2 && s.is_char_boundary(s.len() - 2) {
        let (head, tail) = s.split_at(s.len() - 2);
        if tail.eq_ignore_ascii_case("cr") {
            return (head.trim_end(), Some(DrCr::Credit));
        }
        if tail.eq_ignore_ascii_case("dr") {
            return (head.trim_end(), Some(DrCr::Debit));
        }
    }
    (s, None)
}

/// Parse a statement amount like `₹ 1,23,456.70 Cr` into a decimal.
///
/// The `Cr`/`Dr` marker is dropped; use [`split_drcr`] or
/// [`credit_marked_amount`] when it carries the sign.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let (body, _) = split_drcr(raw);
    let mut s = body.replace(',', "");
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let s = s.strip_prefix('+').unwrap_or(&s);
    if s.is_empty() {
        bail!("empty amount: {raw:?}");
    }
    Decimal::from_str(s).with_context(|| format!("parse amount {raw:?}"))
}

/// Amount whose trailing `Cr` marks a credit; anything else is a debit.
///
/// Returns the amount signed from the account holder's side: credits
/// positive, debits negative.
pub fn credit_marked_amount(raw: &str) -> Result<Decimal> {
    let (_, marker) = split_drcr(raw);
    let value = parse_amount(raw)?.abs();
    Ok(match marker {
        Some(DrCr::Credit) => value,
        _ => -value,
    })
}

/// `Debit` when the text mentions `Dr`, `Credit` when it mentions `Cr`.
pub fn debit_or_credit(text: &str) -> Result<DrCr> {
    if text.contains("Dr") {
        Ok(DrCr::Debit)
    } else if text.contains("Cr") {
        Ok(DrCr::Credit)
    } else {
        Err(anyhow!("neither Dr nor Cr in {text:?}"))
    }
}

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Replace every run of whitespace (including CR/LF) with one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let key = lower.get(..3)?;
    let m = match key {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    // Reject words that merely start like a month ("Decline", "Marketing").
    const FULL: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let full = FULL[(m - 1) as usize];
    let ok = lower.len() == 3 || full.starts_with(&lower);
    ok.then_some(m)
}

fn expand_year(y: &str) -> Option<i32> {
    let n: i32 = y.parse().ok()?;
    match y.len() {
        4 => Some(n),
        2 => Some(if n < 70 { 2000 + n } else { 1900 + n }),
        _ => None,
    }
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})$").expect("numeric date regex")
    })
}

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("iso date regex"))
}

fn day_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?[\s\-/.]*([A-Za-z]{3,9})[\s\-/.,']*(\d{4}|\d{2})$")
            .expect("day-month date regex")
    })
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{3,9})\.?[\s\-]+(\d{1,2})(?:st|nd|rd|th)?,?[\s\-]+(\d{4})$")
            .expect("month-day date regex")
    })
}

fn fuzzy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"\d{4}-\d{1,2}-\d{1,2}",
            r"|\d{1,2}[/\-.]\d{1,2}[/\-.](?:\d{4}|\d{2})\b",
            r"|\d{1,2}(?:st|nd|rd|th)?[\s\-/]*[A-Za-z]{3,9}[\s\-/,']*(?:\d{4}|\d{2})\b",
            r"|[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}",
        ))
        .expect("fuzzy date regex")
    })
}

/// Parse a date cell in any of the layouts Indian statements use.
///
/// Returns `None` for anything that is not a date; callers use this to
/// tell transaction rows from headers, totals and continuation lines.
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let s = collapse_whitespace(raw);
    let s = s.trim_matches(|c: char| c == ':' || c == ',' || c == '.' || c.is_whitespace());
    if s.is_empty() {
        return None;
    }

    if let Some(c) = iso_re().captures(s) {
        return NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }
    if let Some(c) = numeric_re().captures(s) {
        let a: u32 = c[1].parse().ok()?;
        let b: u32 = c[2].parse().ok()?;
        let (day, month) = match order {
            DateOrder::DayFirst => (a, b),
            DateOrder::MonthFirst => (b, a),
        };
        return NaiveDate::from_ymd_opt(expand_year(&c[3])?, month, day);
    }
    if let Some(c) = day_month_re().captures(s) {
        let month = month_from_name(&c[2])?;
        return NaiveDate::from_ymd_opt(expand_year(&c[3])?, month, c[1].parse().ok()?);
    }
    if let Some(c) = month_day_re().captures(s) {
        let month = month_from_name(&c[1])?;
        return NaiveDate::from_ymd_opt(expand_year(&c[3])?, month, c[2].parse().ok()?);
    }
    None
}

/// First date in `text` and the byte offset just past it.
pub fn find_date(text: &str, order: DateOrder) -> Option<(NaiveDate, usize)> {
    fuzzy_re()
        .find_iter(text)
        .find_map(|m| parse_date(m.as_str(), order).map(|d| (d, m.end())))
}

/// Find the first substring of `text` that parses as a date.
pub fn parse_date_fuzzy(text: &str, order: DateOrder) -> Option<NaiveDate> {
    find_date(text, order).map(|(d, _)| d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_amount_strips_markers() {
        assert_eq!(parse_amount("1,23,456.70").unwrap(), dec("123456.70"));
        assert_eq!(parse_amount(" ₹ 1,234.00 ").unwrap(), dec("1234.00"));
        assert_eq!(parse_amount("Rs. 99.5").unwrap(), dec("99.5"));
        assert_eq!(parse_amount("2,500.00 Cr").unwrap(), dec("2500.00"));
        assert_eq!(parse_amount("310.00 dr").unwrap(), dec("310.00"));
        assert_eq!(parse_amount("-45.10").unwrap(), dec("-45.10"));
        assert_eq!(parse_amount("+45.10").unwrap(), dec("45.10"));
    }

    #[test]
    fn test_parse_amount_rejects_empty_and_text() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("  ").is_err());
        assert!(parse_amount("Balance").is_err());
    }

    #[test]
    fn test_credit_marked_amount() {
        assert_eq!(credit_marked_amount("1,000.00 Cr").unwrap(), dec("1000.00"));
        assert_eq!(credit_marked_amount("1,000.00").unwrap(), dec("-1000.00"));
        assert_eq!(credit_marked_amount("12.00 Dr").unwrap(), dec("-12.00"));
    }

    #[test]
    fn test_debit_or_credit() {
        assert_eq!(debit_or_credit("540.00 Dr").unwrap(), DrCr::Debit);
        assert_eq!(debit_or_credit("540.00 Cr").unwrap(), DrCr::Credit);
        assert!(debit_or_credit("540.00").is_err());
    }

    #[test]
    fn test_parse_date_layouts() {
        let o = DateOrder::DayFirst;
        assert_eq!(parse_date("03/04/2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03-04-24", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03.04.2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("3 Apr 2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03-Apr-2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03-APR-24", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03 April 2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("April 3, 2024", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("Sep 21, 2023", o), Some(d(2023, 9, 21)));
        assert_eq!(parse_date("2024-04-03", o), Some(d(2024, 4, 3)));
        assert_eq!(parse_date("03/04/2024", DateOrder::MonthFirst), Some(d(2024, 3, 4)));
    }

    #[test]
    fn test_parse_date_rejects_non_dates() {
        let o = DateOrder::DayFirst;
        assert_eq!(parse_date("", o), None);
        assert_eq!(parse_date("Date", o), None);
        assert_eq!(parse_date("31/02/2024", o), None);
        assert_eq!(parse_date("12 Decline 2024", o), None);
        assert_eq!(parse_date("Opening Balance", o), None);
    }

    #[test]
    fn test_parse_date_fuzzy() {
        let o = DateOrder::DayFirst;
        assert_eq!(
            parse_date_fuzzy("Statement for 01 Jan 2024 to 31 Jan 2024", o),
            Some(d(2024, 1, 1))
        );
        assert_eq!(parse_date_fuzzy("Trade Date 15/03/2024 ok", o), Some(d(2024, 3, 15)));
        assert_eq!(parse_date_fuzzy("nothing here", o), None);
        let (date, end) = find_date("as on 01/04/2024 : 5.00", o).unwrap();
        assert_eq!(date, d(2024, 4, 1));
        assert_eq!(end, 16);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("UPI/123\r\nSWIGGY  \n LTD"), "UPI/123 SWIGGY LTD");
        assert!(is_blank(" \t"));
        assert!(!is_blank(" x "));
    }
}
