//! HDFC savings account statement sent by e-mail (password-protected PDF).
//!
//! The table has no rules; narrations wrap onto lines whose date cell is
//! blank, and the pieces are joined back together without a separator.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, TableSpec};

use crate::importer::{statement_balances, Importer};
use crate::parsers::{pdf_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub struct HdfcSavingsImporter {
    account_number: String,
    name_in_file: String,
    password: String,
    account: String,
}

impl HdfcSavingsImporter {
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
    RE.get_or_init(|| Regex::new(r"(?i)^\s*statement\s+summary").expect("hdfc footer regex"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new("Txn Date"),
        ColumnSpec::new("Narration"),
        ColumnSpec::anchored("Ref", "Chq./Ref.No.").optional(),
        ColumnSpec::new("Value Dt").optional(),
        ColumnSpec::new("Withdrawals"),
        ColumnSpec::new("Deposits"),
        ColumnSpec::new("Closing Balance"),
    ])
    .with_footer(footer_re().clone())
}

struct Pending {
    date: chrono::NaiveDate,
    narration: String,
    withdrawal: String,
    deposit: String,
    balance: String,
    reference: String,
}

impl Pending {
    fn finish(self) -> Result<StatementRow> {
        let w = self.withdrawal.trim();
        let amount = if !is_blank(w) && w != "0.00" {
            -parse_amount(w).with_context(|| format!("withdrawal on {}", self.date))?
        } else {
            parse_amount(&self.deposit).with_context(|| format!("deposit on {}", self.date))?
        };
        let balance = parse_amount(&self.balance).ok();
        Ok(StatementRow::new(self.date, self.narration.replace('\r', " "), amount)
            .with_balance(balance)
            .with_reference(self.reference))
    }
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut pending: Vec<Pending> = Vec::new();
    // Continuations only attach to a row that parsed.
    let mut attached = false;
    for row in &table.rows {
        let date_cell = table.get(row, "Txn Date");
        let narration = table.get(row, "Narration");
        if is_blank(date_cell) {
            if attached && !is_blank(narration) {
                if let Some(last) = pending.last_mut() {
                    last.narration.push_str(narration.trim());
                }
            }
            continue;
        }
        let Some(date) = parse_date(date_cell, DateOrder::DayFirst) else {
            attached = false;
            continue;
        };
        attached = true;
        pending.push(Pending {
            date,
            narration: narration.trim().to_string(),
            withdrawal: table.get(row, "Withdrawals").to_string(),
            deposit: table.get(row, "Deposits").to_string(),
            balance: table.get(row, "Closing Balance").to_string(),
            reference: table.get(row, "Ref").to_string(),
        });
    }
    pending.into_iter().map(Pending::finish).collect()
}

impl Importer for HdfcSavingsImporter {
    fn name(&self) -> &str {
        "hdfc_savings"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        pdf_contains_all(
            file,
            Some(&self.password),
            &[&self.account_number, &self.name_in_file],
        )
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

    fn balances(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let text = file.pdf_text(Some(&self.password))?;
        Ok(statement_balances(
            &text,
            &self.account,
            &source_of(file),
            "Opening Balance",
            "Closing Balance",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec, line, page};

    #[test]
    fn test_continuations_and_zero_withdrawal() {
        let x = [40.0, 110.0, 300.0, 380.0, 460.0];
        let p = page(
            vec![
                line(
                    &[
                        ("Txn Date", x[0]),
                        ("Narration", x[1]),
                        ("Withdrawals", x[2]),
                        ("Deposits", x[3]),
                        ("Closing Balance", x[4]),
                    ],
                    100.0,
                ),
                line(
                    &[
                        ("01/04/24", x[0]),
                        ("UPI-SWIGGY-SWIGGY@IC", x[1]),
                        ("320.00", x[2]),
                        ("9,680.00", x[4]),
                    ],
                    120.0,
                ),
                line(&[("ICI-123", x[1])], 130.0),
                line(
                    &[
                        ("02/04/24", x[0]),
                        ("NEFT CR-ACME", x[1]),
                        ("0.00", x[2]),
                        ("5,000.00", x[3]),
                        ("14,680.00", x[4]),
                    ],
                    150.0,
                ),
                line(&[("STATEMENT SUMMARY", x[0])], 200.0),
                line(&[("Opening Balance", x[0])], 210.0),
            ],
            vec![],
        );
        let rows = parse_rows(&[p]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2024, 4, 1));
        assert_eq!(rows[0].narration, "UPI-SWIGGY-SWIGGY@ICICI-123");
        assert_eq!(rows[0].amount, dec("-320.00"));
        assert_eq!(rows[1].amount, dec("5000.00"));
        assert_eq!(rows[1].balance, Some(dec("14680.00")));
    }
}
