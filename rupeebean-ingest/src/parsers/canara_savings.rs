//! Canara Bank savings statement sent by e-mail (password-protected PDF).
//!
//! The column header is printed on the first page only.

use anyhow::{bail, Context, Result};

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{collapse_whitespace, is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, RowBreak, TableSpec};

use crate::importer::{running_balances, Importer};
use crate::parsers::{pdf_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

const DATE: &str = "Txn Date";
const NARRATION: &str = "Txn Description";
const DEBIT: &str = "Debit";
const CREDIT: &str = "Credit";
const BALANCE: &str = "Balance";

pub struct CanaraSavingsImporter {
    account_number: String,
    name_in_file: String,
    password: String,
    account: String,
}

impl CanaraSavingsImporter {
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

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new(DATE),
        ColumnSpec::new("Value Date").optional(),
        ColumnSpec::new("Cheque No.").optional(),
        ColumnSpec::new(NARRATION),
        ColumnSpec::new("Branch Code").optional(),
        ColumnSpec::new(DEBIT),
        ColumnSpec::new(CREDIT),
        ColumnSpec::new(BALANCE),
    ])
    .with_row_break(RowBreak::Rules { min_width: 100.0 })
    .with_carry_header(true)
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut out = Vec::new();
    for row in &table.rows {
        let raw_date = table.get(row, DATE);
        if is_blank(raw_date) {
            continue;
        }
        let Some(date) = parse_date(raw_date, DateOrder::DayFirst) else {
            continue;
        };
        let debit = table.get(row, DEBIT).trim();
        let credit = table.get(row, CREDIT).trim();
        if debit.is_empty() && credit.is_empty() {
            bail!("both debit and credit are empty on {date} (page {})", row.page);
        }
        let amount = if !debit.is_empty() && debit != "0.00" {
            -parse_amount(debit).with_context(|| format!("debit on {date}"))?
        } else {
            parse_amount(credit).with_context(|| format!("credit on {date}"))?
        };
        out.push(
            StatementRow::new(date, collapse_whitespace(table.get(row, NARRATION)), amount)
                .with_balance(parse_amount(table.get(row, BALANCE)).ok()),
        );
    }
    Ok(out)
}

impl Importer for CanaraSavingsImporter {
    fn name(&self) -> &str {
        "canara_savings"
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
        let rows = parse_rows(&file.pages(Some(&self.password))?)?;
        Ok(running_balances(&rows, &self.account, &source_of(file)))
    }
}
