//! ICICI savings monthly statement exported as CSV.

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use rust_decimal::Decimal;

use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::Table;

use crate::delimited::read_records;
use crate::importer::Importer;
use crate::parsers::{masked_account, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

const DATE: &str = "DATE";
const DESCRIPTION: &str = "PARTICULARS";
const CREDIT: &str = "DEPOSITS";
const DEBIT: &str = "WITHDRAWALS";
const BALANCE: &str = "BALANCE";

pub struct IciciSavingsCsvImporter {
    account_number: String,
    account: String,
}

impl IciciSavingsCsvImporter {
    pub fn new(account_number: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            account: account.into(),
        }
    }
}

fn row_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}-\d{2}-\d{4}").expect("icici row date regex"))
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"for the period -?(.*)").expect("icici period regex"))
}

/// Rows from the last `DATE,` header through the last dated line.
pub fn transaction_table(text: &str) -> Result<Table> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .rposition(|l| l.starts_with("DATE,"))
        .ok_or_else(|| anyhow!("no `DATE,` header line"))?;
    let end = lines
        .iter()
        .rposition(|l| row_date_re().is_match(l))
        .filter(|&e| e > start)
        .unwrap_or(start);
    let body = lines[start..=end].join("\n");
    Table::from_grid(read_records(&body, 0)?, 0)
}

fn amount_or_zero(raw: &str) -> Result<Decimal> {
    if is_blank(raw) {
        return Ok(Decimal::ZERO);
    }
    parse_amount(raw)
}

pub fn parse_rows(text: &str) -> Result<Vec<StatementRow>> {
    let table = transaction_table(text)?;
    let mut out = Vec::new();
    for row in &table.rows {
        let raw_date = table.get(row, DATE);
        let date = parse_date(raw_date, DateOrder::DayFirst)
            .ok_or_else(|| anyhow!("bad date {raw_date:?} on line {}", row.line + 1))?;
        let credit = amount_or_zero(table.get(row, CREDIT)).with_context(|| format!("deposit on {date}"))?;
        let debit = amount_or_zero(table.get(row, DEBIT)).with_context(|| format!("withdrawal on {date}"))?;
        let balance = parse_amount(table.get(row, BALANCE)).ok();
        out.push(
            StatementRow::new(date, table.get(row, DESCRIPTION), credit - debit).with_balance(balance),
        );
    }
    Ok(out)
}

/// `ICICI_Savings_Statement_<period>.csv` from the `for the period` line.
pub fn statement_file_name(text: &str) -> Option<String> {
    let c = period_re().captures(text)?;
    let period = c[1].trim().trim_matches(',').trim().replace('/', "-");
    Some(format!("ICICI_Savings_Statement_{period}.csv"))
}

impl Importer for IciciSavingsCsvImporter {
    fn name(&self) -> &str {
        "icici_savings_csv"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if file.extension().as_deref() != Some("csv") {
            return false;
        }
        let masked = masked_account(&self.account_number, 8);
        file.text().is_ok_and(|t| t.contains(&masked))
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        let document = file.name();
        Ok(parse_rows(file.text()?)?
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

    fn file_name(&self, file: &SourceFile) -> Result<Option<String>> {
        Ok(statement_file_name(file.text()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec};

    const STATEMENT: &str = "\
Detailed Statement
Account Number,XXXXXXXX0056
Transactions List for the period - 01/04/2024 - 30/04/2024
DATE,MODE,PARTICULARS,DEPOSITS,WITHDRAWALS,BALANCE
01-04-2024,,B/F,0.00,0.00,\"10,000.00\"
02-04-2024,UPI,UPI/123/SWIGGY,0.00,350.00,\"9,650.00\"
05-04-2024,NEFT,NEFT-ACME-SALARY,\"50,000.00\",0.00,\"59,650.00\"
Legends Used in Account Statement
";

    #[test]
    fn test_parse_rows_between_header_and_last_date() {
        let rows = parse_rows(STATEMENT).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].date, d(2024, 4, 2));
        assert_eq!(rows[1].narration, "UPI/123/SWIGGY");
        assert_eq!(rows[1].amount, dec("-350.00"));
        assert_eq!(rows[2].amount, dec("50000.00"));
        assert_eq!(rows[2].balance, Some(dec("59650.00")));
    }

    #[test]
    fn test_statement_file_name() {
        assert_eq!(
            statement_file_name(STATEMENT).as_deref(),
            Some("ICICI_Savings_Statement_01-04-2024 - 30-04-2024.csv")
        );
    }
}
