//! HDFC credit card statement (password-protected PDF).

use anyhow::{bail, Context, Result};

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{credit_marked_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, TableSpec};

use crate::importer::Importer;
use crate::parsers::{pdf_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub const DATE: &str = "Date";
pub const NARRATION: &str = "Transaction Description";
pub const AMOUNT: &str = "Amount (in Rs.)";

pub struct HdfcCreditCardImporter {
    lines_to_grep: Vec<String>,
    password: String,
    account: String,
}

impl HdfcCreditCardImporter {
    /// `lines_to_grep` must all appear in the statement; at least one is needed.
    pub fn new(
        lines_to_grep: Vec<String>,
        password: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self> {
        if lines_to_grep.is_empty() {
            bail!("hdfc_credit_card needs at least one line to identify statements");
        }
        Ok(Self {
            lines_to_grep,
            password: password.into(),
            account: account.into(),
        })
    }
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new(DATE),
        ColumnSpec::new(NARRATION),
        ColumnSpec::new(AMOUNT),
    ])
}

/// Statement dates sometimes carry a time after the date.
fn row_date(cell: &str) -> Option<chrono::NaiveDate> {
    parse_date(cell, DateOrder::DayFirst).or_else(|| {
        cell.split_whitespace()
            .next()
            .and_then(|first| parse_date(first, DateOrder::DayFirst))
    })
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut out = Vec::new();
    for row in &table.rows {
        let Some(date) = row_date(table.get(row, DATE)) else {
            continue;
        };
        let raw = table.get(row, AMOUNT);
        let amount = credit_marked_amount(raw)
            .with_context(|| format!("amount {raw:?} on {date}"))?;
        out.push(StatementRow::new(
            date,
            table.get(row, NARRATION).replace('\r', " ").trim(),
            amount,
        ));
    }
    Ok(out)
}

impl Importer for HdfcCreditCardImporter {
    fn name(&self) -> &str {
        "hdfc_credit_card"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        let needles: Vec<&str> = self.lines_to_grep.iter().map(String::as_str).collect();
        pdf_contains_all(file, Some(&self.password), &needles)
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        Ok(parse_rows(&file.pages(Some(&self.password))?)?
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_transaction(&self.account, &source, i, None).into())
            .collect())
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }
}
