//! Paytm Payments Bank savings statement (PDF).
//!
//! Each transaction spans several lines: the date line carries the amount,
//! the next line the time of day, and every line may add a detail.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, TableSpec};

use crate::importer::Importer;
use crate::parsers::{is_pdf, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub struct PaytmImporter {
    account_number: String,
    account: String,
}

impl PaytmImporter {
    pub fn new(account_number: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            account: account.into(),
        }
    }
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Account statement for: \d+ \w+ \d{4} to \d+ \w+ \d{4}")
            .expect("paytm period regex")
    })
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d\d?:\d{2} +(AM|PM)$").expect("paytm time regex"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::anchored("DATE", "DATE"),
        ColumnSpec::new("TRANSACTION DETAILS"),
        ColumnSpec::anchored("NOTES", "NOTES").optional(),
        ColumnSpec::new("AMOUNT"),
    ])
    .with_carry_header(true)
}

struct Draft {
    timestamp: NaiveDateTime,
    amount: Decimal,
    details: Vec<String>,
}

impl Draft {
    fn finish(self) -> StatementRow {
        let split = self.details.len().min(2);
        let narration = self.details[..split].join(" ");
        let reference = self.details[split..].join(" ");
        StatementRow::new(self.timestamp.date(), narration, self.amount).with_reference(reference)
    }
}

fn signed_amount(cell: &str) -> Result<Decimal> {
    let s = cell.trim();
    let value = parse_amount(s.trim_start_matches(['+', '-']))
        .with_context(|| format!("paytm amount {cell:?}"))?;
    Ok(if s.starts_with('-') { -value } else { value })
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut out = Vec::new();
    let mut draft: Option<Draft> = None;
    for row in &table.rows {
        let date_cell = table.get(row, "DATE").trim();
        let details = table.get(row, "TRANSACTION DETAILS").trim();

        let opens = !date_cell.contains(':') && date_cell.len() > 2;
        if opens {
            let Some(date) = parse_date(date_cell, DateOrder::DayFirst) else {
                debug!(cell = date_cell, "paytm line without a date skipped");
                continue;
            };
            out.extend(draft.take().map(Draft::finish));
            draft = Some(Draft {
                timestamp: date.and_time(NaiveTime::MIN),
                amount: signed_amount(table.get(row, "AMOUNT"))?,
                details: Vec::new(),
            });
        } else if time_re().is_match(date_cell) {
            if let Some(d) = draft.as_mut() {
                let time = NaiveTime::parse_from_str(date_cell, "%I:%M %p")
                    .with_context(|| format!("paytm time {date_cell:?}"))?;
                d.timestamp = d.timestamp.date().and_time(time);
            }
        }
        if !is_blank(details) {
            if let Some(d) = draft.as_mut() {
                d.details.push(details.to_string());
            }
        }
    }
    out.extend(draft.take().map(Draft::finish));
    Ok(out)
}

/// Statement period start, as printed in the heading.
pub fn statement_start(text: &str) -> Option<NaiveDate> {
    let m = period_re().find(text)?;
    let rest = m.as_str().trim_start_matches("Account statement for:");
    let start = rest.split(" to ").next()?;
    parse_date(start, DateOrder::DayFirst)
}

impl Importer for PaytmImporter {
    fn name(&self) -> &str {
        "paytm"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if !is_pdf(file) {
            return false;
        }
        let Ok(text) = file.pdf_text(None) else {
            return false;
        };
        let saving = format!(r"{}\s+SAVING", regex::escape(&self.account_number));
        period_re().is_match(&text) && Regex::new(&saving).is_ok_and(|re| re.is_match(&text))
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        Ok(parse_rows(&file.pages(None)?)?
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_transaction(&self.account, &source, i, None).into())
            .collect())
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }

    fn file_date(&self, file: &SourceFile) -> Result<Option<NaiveDate>> {
        Ok(statement_start(&file.pdf_text(None)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec, line, page};

    #[test]
    fn test_multi_line_transactions() {
        let x = [40.0, 150.0, 350.0, 480.0];
        let p = page(
            vec![
                line(
                    &[
                        ("DATE & TIME", x[0]),
                        ("TRANSACTION DETAILS", x[1]),
                        ("NOTES & TAGS", x[2]),
                        ("AMOUNT", x[3]),
                    ],
                    100.0,
                ),
                line(&[("12 Jan 2020", x[0]), ("Paid to Chaiwala", x[1]), ("- Rs.40", x[3])], 120.0),
                line(&[("9:15 AM", x[0]), ("UPI Ref No: 1234", x[1])], 130.0),
                line(&[("Order #55", x[1])], 140.0),
                line(&[("14 Jan 2020", x[0]), ("Received from Bob", x[1]), ("+ Rs.1,000", x[3])], 160.0),
                line(&[("11:02 PM", x[0]), ("UPI Ref No: 99", x[1])], 170.0),
            ],
            vec![],
        );
        let rows = parse_rows(&[p]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2020, 1, 12));
        assert_eq!(rows[0].narration, "Paid to Chaiwala UPI Ref No: 1234");
        assert_eq!(rows[0].reference.as_deref(), Some("Order #55"));
        assert_eq!(rows[0].amount, dec("-40"));
        assert_eq!(rows[1].amount, dec("1000"));
        assert_eq!(rows[1].reference, None);
    }

    #[test]
    fn test_statement_start() {
        let text = "Paytm Payments Bank\nAccount statement for: 1 Jan 2020 to 31 Jul 2020\n";
        assert_eq!(statement_start(text), Some(d(2020, 1, 1)));
        assert_eq!(statement_start("nothing"), None);
    }
}
