//! ICICI savings statement sent by e-mail (password-protected PDF).
//!
//! Transactions sit between the `DATE MODE PARTICULARS ...` header line and
//! a `Total:` footer, separated by horizontal rules.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::info;

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date_fuzzy, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, RowBreak, TableSpec};

use crate::importer::{running_balances, Importer};
use crate::parsers::{first_page_contains_all, masked_account, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub const HEADER: &str = "DATE MODE PARTICULARS DEPOSITS WITHDRAWALS BALANCE";

pub struct IciciSavingsEmailImporter {
    account_number: String,
    name_in_file: String,
    password: String,
    account: String,
}

impl IciciSavingsEmailImporter {
    pub fn new(
        account_number: impl Into<String>,
        name_in_file: impl Into<String>,
        password: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            name_in_file: name_in_file.into(),
            password: password.into(),
            account: account.into(),
        }
    }
}

fn footer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Total:[ \d,.]+$").expect("icici footer regex"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(HEADER.split(' ').map(ColumnSpec::new).collect())
        .with_row_break(RowBreak::Rules { min_width: 100.0 })
        .with_footer(footer_re().clone())
}

/// Every ruled row, including those that move no money (`B/F`).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLine {
    pub row: StatementRow,
    pub moves_money: bool,
}

pub fn parse_lines(pages: &[PageLayout]) -> Result<Vec<LedgerLine>> {
    let mut out = Vec::new();
    for page in pages {
        if page.lines().iter().all(|l| l.text().trim() != HEADER) {
            info!(page = page.number, "no transaction header on page");
            continue;
        }
        let table = extract_table(std::slice::from_ref(page), &table_spec())?;
        for row in &table.rows {
            let Some(date) = parse_date_fuzzy(table.get(row, "DATE"), DateOrder::DayFirst) else {
                continue;
            };
            let deposit = table.get(row, "DEPOSITS");
            let withdrawal = table.get(row, "WITHDRAWALS");
            let moves_money = !is_blank(deposit) || !is_blank(withdrawal);
            let amount = if !is_blank(withdrawal) {
                -parse_amount(withdrawal).with_context(|| format!("withdrawal on {date}"))?
            } else if !is_blank(deposit) {
                parse_amount(deposit).with_context(|| format!("deposit on {date}"))?
            } else {
                Decimal::ZERO
            };
            let balance = parse_amount(table.get(row, "BALANCE")).ok();
            out.push(LedgerLine {
                row: StatementRow::new(date, table.get(row, "PARTICULARS"), amount)
                    .with_balance(balance),
                moves_money,
            });
        }
    }
    Ok(out)
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    Ok(parse_lines(pages)?
        .into_iter()
        .filter(|l| l.moves_money)
        .map(|l| l.row)
        .collect())
}

impl Importer for IciciSavingsEmailImporter {
    fn name(&self) -> &str {
        "icici_savings_email"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        let masked = masked_account(&self.account_number, self.account_number.len().saturating_sub(4));
        first_page_contains_all(file, Some(&self.password), &[&masked, &self.name_in_file])
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        let document = file.name();
        Ok(parse_rows(&file.pages(Some(&self.password))?)?
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                r.into_transaction(&self.account, &source, i, Some(&document))
                    .into()
            })
            .collect())
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }

    /// B/F lines count here: they carry the opening balance.
    fn balances(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let rows: Vec<StatementRow> = parse_lines(&file.pages(Some(&self.password))?)?
            .into_iter()
            .map(|l| l.row)
            .collect();
        Ok(running_balances(&rows, &self.account, &source_of(file)))
    }
}
