//! The seam every statement importer implements.

use std::sync::OnceLock;

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use rupeebean_core::ledger::{Amount, Balance, Directive, Source};
use rupeebean_core::parse::{find_date, parse_amount, DateOrder};

use crate::source::SourceFile;
use crate::types::StatementRow;

pub trait Importer {
    /// Short name shown by `identify`.
    fn name(&self) -> &str;

    /// Whether `file` is a statement for this importer's account.
    /// Read failures mean "not mine".
    fn identify(&self, file: &SourceFile) -> bool;

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>>;

    fn file_account(&self, file: &SourceFile) -> Result<String>;

    fn file_date(&self, _file: &SourceFile) -> Result<Option<NaiveDate>> {
        Ok(None)
    }

    fn file_name(&self, _file: &SourceFile) -> Result<Option<String>> {
        Ok(None)
    }

    /// Opening and closing balance assertions printed on the statement.
    fn balances(&self, _file: &SourceFile) -> Result<Vec<Directive>> {
        Ok(Vec::new())
    }
}

fn date_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}\.").expect("date prefix regex"))
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d[\d,]*\.\d{2}").expect("amount regex"))
}

/// Drop a leading `YYYY-MM-DD.` so refiling keeps the original name.
pub fn strip_date_prefix(name: &str) -> String {
    date_prefix_re().replace(name, "").into_owned()
}

/// Find `label` in `text` followed by a date and an amount.
///
/// Statements print e.g. `Opening Balance as on 01/04/2024 : 12,345.00`.
pub fn find_balance(text: &str, label: &str) -> Option<(NaiveDate, Decimal)> {
    for line in text.lines() {
        let Some(pos) = line.find(label) else {
            continue;
        };
        let rest = &line[pos + label.len()..];
        let Some((date, end)) = find_date(rest, DateOrder::DayFirst) else {
            continue;
        };
        let amount = amount_re()
            .find_iter(&rest[end..])
            .find_map(|m| parse_amount(m.as_str()).ok());
        if let Some(amount) = amount {
            return Some((date, amount));
        }
    }
    None
}

/// Opening (dated the day before) and closing balance assertions.
pub fn statement_balances(
    text: &str,
    account: &str,
    source: &Source,
    opening_label: &str,
    closing_label: &str,
) -> Vec<Directive> {
    let mut out = Vec::new();
    if let Some((date, amount)) = find_balance(text, opening_label) {
        let date = date.pred_opt().unwrap_or(date);
        out.push(Balance::new(source.clone(), date, account, Amount::inr(amount)).into());
    }
    if let Some((date, amount)) = find_balance(text, closing_label) {
        out.push(Balance::new(source.clone(), date, account, Amount::inr(amount)).into());
    }
    out
}

/// Balances from the running balance column: the one before the first row
/// (dated that day) and the one after the last row (dated the day after).
pub fn running_balances(rows: &[StatementRow], account: &str, source: &Source) -> Vec<Directive> {
    let mut out = Vec::new();
    if let Some((first, balance)) = rows.first().and_then(|r| Some((r, r.balance?))) {
        let amount = Amount::inr(balance - first.amount);
        out.push(Balance::new(source.clone(), first.date, account, amount).into());
    }
    if let Some((last, balance)) = rows.last().and_then(|r| Some((r, r.balance?))) {
        let date = last.date.succ_opt().unwrap_or(last.date);
        out.push(Balance::new(source.clone(), date, account, Amount::inr(balance)).into());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_date_prefix() {
        assert_eq!(strip_date_prefix("2024-01-05.mail.html"), "mail.html");
        assert_eq!(strip_date_prefix("mail.html"), "mail.html");
        assert_eq!(strip_date_prefix("2024-01-05mail.html"), "2024-01-05mail.html");
    }

    #[test]
    fn test_find_balance() {
        let text = "Account Summary\nOpening Balance as on 01/04/2024 : 12,345.60\nClosing Balance 30-Apr-2024 9,000.00 Cr";
        let (d, a) = find_balance(text, "Opening Balance").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(a, "12345.60".parse::<Decimal>().unwrap());
        let (d, a) = find_balance(text, "Closing Balance").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
        assert_eq!(a, "9000.00".parse::<Decimal>().unwrap());
        assert!(find_balance(text, "Available Balance").is_none());
    }

    #[test]
    fn test_statement_balances_shifts_opening_date() {
        let text = "Opening Balance: 01/04/2024 100.00\nClosing Balance: 30/04/2024 250.50";
        let out = statement_balances(text, "Assets:Bank:HDFC", &Source::new("s.pdf", 0), "Opening Balance", "Closing Balance");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(out[1].date(), NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
    }

    #[test]
    fn test_running_balances() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 4, d).unwrap();
        let dec = |s: &str| s.parse::<Decimal>().unwrap();
        let rows = vec![
            StatementRow::new(day(1), "UPI", dec("-150.00")).with_balance(Some(dec("850.00"))),
            StatementRow::new(day(3), "NEFT", dec("2000.00")).with_balance(Some(dec("2850.00"))),
        ];
        let out = running_balances(&rows, "Assets:Bank:Canara", &Source::new("s.pdf", 0));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date(), day(1));
        assert_eq!(out[1].date(), day(4));
        assert!(running_balances(&[], "Assets:Bank:Canara", &Source::new("s.pdf", 0)).is_empty());
    }
}
