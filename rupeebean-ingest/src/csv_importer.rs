//! Configurable importer for plain CSV exports.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use rupeebean_core::ledger::{Amount, Balance, Directive, Source};
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};

use crate::delimited::read_records;
use crate::importer::Importer;
use crate::source::SourceFile;
use crate::types::StatementRow;

/// Column indexes (0-based) of the fields a CSV export carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvColumns {
    pub date: usize,
    pub narration: usize,
    /// Single signed amount column.
    pub amount: Option<usize>,
    /// Separate withdrawal / deposit columns, used when `amount` is unset.
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    /// `CR` in this column flips the sign of the amount.
    pub drcr: Option<usize>,
    pub balance: Option<usize>,
    pub reference: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CsvImporter {
    name: String,
    account: String,
    columns: CsvColumns,
    content: Regex,
    skip_lines: usize,
    date_order: DateOrder,
    invert_sign: bool,
    mime: Option<String>,
    document_meta: bool,
}

impl CsvImporter {
    /// `content` must match somewhere in the file for it to be identified.
    pub fn new(
        name: impl Into<String>,
        account: impl Into<String>,
        columns: CsvColumns,
        content: &str,
    ) -> Result<Self> {
        let content = Regex::new(&format!("(?m){content}"))
            .with_context(|| format!("invalid identification pattern {content:?}"))?;
        Ok(Self {
            name: name.into(),
            account: account.into(),
            columns,
            content,
            skip_lines: 0,
            date_order: DateOrder::DayFirst,
            invert_sign: false,
            mime: None,
            document_meta: false,
        })
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub fn with_invert_sign(mut self, invert: bool) -> Self {
        self.invert_sign = invert;
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn with_document_meta(mut self, enabled: bool) -> Self {
        self.document_meta = enabled;
        self
    }

    fn cell<'a>(record: &'a [String], idx: Option<usize>) -> &'a str {
        idx.and_then(|i| record.get(i)).map(String::as_str).unwrap_or("")
    }

    fn amount_of(&self, record: &[String]) -> Result<Option<Decimal>> {
        let cols = &self.columns;
        let mut amount = match cols.amount {
            Some(_) => {
                let raw = Self::cell(record, cols.amount);
                if is_blank(raw) {
                    return Ok(None);
                }
                parse_amount(raw)?
            }
            None => {
                let debit = Self::cell(record, cols.debit);
                let credit = Self::cell(record, cols.credit);
                if is_blank(debit) && is_blank(credit) {
                    return Ok(None);
                }
                let value = |s: &str| -> Result<Decimal> {
                    if is_blank(s) {
                        Ok(Decimal::ZERO)
                    } else {
                        parse_amount(s)
                    }
                };
                value(credit)? - value(debit)?
            }
        };
        if self.invert_sign {
            amount = -amount;
        }
        if Self::cell(record, cols.drcr).trim().eq_ignore_ascii_case("CR") {
            amount = -amount;
        }
        Ok(Some(amount))
    }

    /// Data rows of `file`; rows without a parseable date or amount are skipped.
    pub fn rows(&self, file: &SourceFile) -> Result<Vec<StatementRow>> {
        let records = read_records(file.text()?, self.skip_lines)?;
        let mut out = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let Some(date) = parse_date(Self::cell(record, Some(self.columns.date)), self.date_order)
            else {
                debug!(line = i + self.skip_lines + 1, "csv row without date skipped");
                continue;
            };
            let Some(amount) = self
                .amount_of(record)
                .with_context(|| format!("{}: line {}", file.name(), i + self.skip_lines + 1))?
            else {
                debug!(line = i + self.skip_lines + 1, "csv row without amount skipped");
                continue;
            };
            let balance = match Self::cell(record, self.columns.balance) {
                b if is_blank(b) => None,
                b => parse_amount(b).ok(),
            };
            let narration = Self::cell(record, Some(self.columns.narration)).to_string();
            out.push(
                StatementRow::new(date, narration, amount)
                    .with_balance(balance)
                    .with_reference(Self::cell(record, self.columns.reference)),
            );
        }
        Ok(out)
    }
}

impl Importer for CsvImporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if let Some(mime) = &self.mime {
            if file.mime_type() != Some(mime.as_str()) {
                return false;
            }
        }
        file.text().is_ok_and(|t| self.content.is_match(t))
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = Source::new(file.path().display().to_string(), 0);
        let document = file.name();
        let document = self.document_meta.then_some(document.as_str());
        Ok(self
            .rows(file)?
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.into_transaction(&self.account, &source, i, document).into())
            .collect())
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }

    fn file_date(&self, file: &SourceFile) -> Result<Option<NaiveDate>> {
        Ok(self.rows(file)?.iter().map(|r| r.date).max())
    }

    /// Balance after the latest row, asserted the following day.
    fn balances(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let rows = self.rows(file)?;
        let latest = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.balance.is_some())
            .max_by_key(|(i, r)| (r.date, *i));
        let Some((_, row)) = latest else {
            return Ok(Vec::new());
        };
        let Some(balance) = row.balance else {
            return Ok(Vec::new());
        };
        let date = row.date.succ_opt().unwrap_or(row.date);
        Ok(vec![Balance::new(
            Source::new(file.path().display().to_string(), 0),
            date,
            &self.account,
            Amount::inr(balance),
        )
        .into()])
    }
}
