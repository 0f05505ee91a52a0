//! Axis Bank credit card statement sent by e-mail (password-protected PDF).
//!
//! Flipkart Axis statements add a `CASHBACK EARNED` column; the cashback is
//! booked against a separate account with the opposite sign.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{info, warn};

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::{Amount, Directive, Posting};
use rupeebean_core::parse::{
    debit_or_credit, is_blank, parse_amount, parse_date_fuzzy, DateOrder, DrCr,
};
use rupeebean_core::table::{extract_table, ColumnMode, ColumnSpec, RowBreak, TableSpec};

use crate::importer::Importer;
use crate::parsers::{first_page_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub const DATE: &str = "DATE";
pub const PARTICULARS: &str = "TRANSACTION DETAILS";
pub const AMOUNT: &str = "AMOUNT (Rs.)";
pub const CASHBACK: &str = "CASHBACK EARNED";

pub struct AxisCreditCardImporter {
    name_in_file: String,
    password: String,
    last_four: String,
    account: String,
    cashback_account: Option<String>,
}

impl AxisCreditCardImporter {
    pub fn new(
        name_in_file: impl Into<String>,
        password: impl Into<String>,
        last_four: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            name_in_file: name_in_file.into(),
            password: password.into(),
            last_four: last_four.into(),
            account: account.into(),
            cashback_account: None,
        }
    }

    pub fn with_cashback_account(mut self, account: impl Into<String>) -> Self {
        self.cashback_account = Some(account.into());
        self
    }
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"MERCHANT CATEGORY").expect("axis header regex"))
}

fn footer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"End of Statement").expect("axis footer regex"))
}

fn row_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}[/-]\d{2}[/-]\d{4}$").expect("axis date regex"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new(DATE),
        ColumnSpec::new(PARTICULARS),
        ColumnSpec::new("MERCHANT CATEGORY").optional(),
        ColumnSpec::new(AMOUNT),
        ColumnSpec::new(CASHBACK).optional(),
    ])
    .with_column_mode(ColumnMode::Overlap)
    .with_row_break(RowBreak::WhenMatches {
        column: 0,
        pattern: row_start_re().clone(),
    })
    .with_footer(footer_re().clone())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardRow {
    pub row: StatementRow,
    /// Signed for the cashback account; `None` when the column is absent.
    pub cashback: Option<Decimal>,
}

fn unsigned(cell: &str) -> Result<Decimal> {
    parse_amount(cell.trim().trim_end_matches(['C', 'c', 'D', 'd', 'r']))
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<CardRow>> {
    let mut out = Vec::new();
    for page in pages {
        if page.find_line(header_re()).is_none() {
            info!(page = page.number, "no transaction header on page");
            continue;
        }
        let table = extract_table(std::slice::from_ref(page), &table_spec())?;
        let has_cashback = page.lines().iter().any(|l| l.text().contains(CASHBACK));
        for row in &table.rows {
            let Some(date) = parse_date_fuzzy(table.get(row, DATE), DateOrder::DayFirst) else {
                continue;
            };
            let raw = table.get(row, AMOUNT);
            let sign = match debit_or_credit(raw)? {
                DrCr::Debit => Decimal::NEGATIVE_ONE,
                DrCr::Credit => Decimal::ONE,
            };
            let amount = sign * unsigned(raw).with_context(|| format!("amount {raw:?} on {date}"))?;
            let cashback = if has_cashback {
                let cell = table.get(row, CASHBACK);
                let value = if is_blank(cell) { Decimal::ZERO } else { unsigned(cell)? };
                Some(-sign * value)
            } else {
                None
            };
            out.push(CardRow {
                row: StatementRow::new(date, table.get(row, PARTICULARS), amount),
                cashback,
            });
        }
    }
    Ok(out)
}

impl Importer for AxisCreditCardImporter {
    fn name(&self) -> &str {
        "axis_credit_card"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        let masked = format!("******{}", self.last_four);
        first_page_contains_all(file, Some(&self.password), &[&masked, &self.name_in_file])
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        let document = file.name();
        let mut out = Vec::new();
        for (i, card_row) in parse_rows(&file.pages(Some(&self.password))?)?.into_iter().enumerate() {
            let mut txn = card_row.row.into_transaction(&self.account, &source, i, Some(&document));
            match (card_row.cashback, &self.cashback_account) {
                (Some(cb), Some(account)) if !cb.is_zero() => {
                    txn = txn.with_posting(Posting::new(account, Amount::inr(cb)));
                }
                (Some(cb), None) if !cb.is_zero() => {
                    warn!(date = %txn.date, "cashback earned but no cashback account configured");
                }
                _ => {}
            }
            out.push(txn.into());
        }
        Ok(out)
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }
}
