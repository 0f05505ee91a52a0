//! ICICI savings account history exported from net banking (XLS).

use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;

use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::Table;

use crate::importer::Importer;
use crate::parsers::source_of;
use crate::sheet::grid_text;
use crate::source::SourceFile;
use crate::types::StatementRow;

/// Row holding the column captions.
pub const HEADER_ROW: usize = 12;
/// Legend and disclaimer rows printed under the transactions.
pub const FOOTER_ROWS: usize = 29;

const DATE: &str = "Transaction Date";
const REMARKS: &str = "Transaction Remarks";
const WITHDRAWAL: &str = "Withdrawal Amount (INR )";
const DEPOSIT: &str = "Deposit Amount (INR )";

pub struct IciciSavingsXlsImporter {
    account_number: String,
    account: String,
}

impl IciciSavingsXlsImporter {
    pub fn new(account_number: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            account: account.into(),
        }
    }
}

fn amount_or_zero(raw: &str) -> Result<Decimal> {
    if is_blank(raw) {
        return Ok(Decimal::ZERO);
    }
    parse_amount(raw)
}

pub fn transaction_table(grid: &[Vec<String>]) -> Result<Table> {
    if grid.len() <= HEADER_ROW {
        bail!("sheet has {} rows, header expected at row {HEADER_ROW}", grid.len());
    }
    let end = grid.len().saturating_sub(FOOTER_ROWS).max(HEADER_ROW + 1);
    let mut rows: Vec<Vec<String>> = grid[HEADER_ROW..end].to_vec();
    rows.retain(|r| r.iter().any(|c| !is_blank(c)));
    let mut table = Table::from_grid(rows, 0)?;
    // Header cells may come with doubled spaces.
    table.headers = table
        .headers
        .iter()
        .map(|h| h.split(' ').filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" "))
        .map(|h| h.replace("(INR)", "(INR )"))
        .collect();
    Ok(table)
}

pub fn parse_rows(grid: &[Vec<String>]) -> Result<Vec<StatementRow>> {
    let table = transaction_table(grid)?;
    for name in [DATE, REMARKS, WITHDRAWAL, DEPOSIT] {
        if table.column(name).is_none() {
            bail!("column {name:?} missing from {:?}", table.headers);
        }
    }
    let mut out = Vec::new();
    for row in &table.rows {
        let raw_date = table.get(row, DATE);
        let date = parse_date(raw_date, DateOrder::DayFirst)
            .ok_or_else(|| anyhow!("bad date {raw_date:?} in row {}", HEADER_ROW + row.line))?;
        let withdrawal = amount_or_zero(table.get(row, WITHDRAWAL))
            .with_context(|| format!("withdrawal on {date}"))?;
        let deposit = amount_or_zero(table.get(row, DEPOSIT))
            .with_context(|| format!("deposit on {date}"))?;
        if withdrawal.is_zero() && deposit.is_zero() {
            bail!("both deposit and withdrawal are zero on {date}");
        }
        let amount = if withdrawal.is_zero() { deposit } else { -withdrawal };
        let remarks = table.get(row, REMARKS).replace('\r', " ");
        out.push(StatementRow::new(date, remarks.clone(), amount).with_reference(remarks));
    }
    Ok(out)
}

/// `ICICI_Saving_<start>_to_<end>.xls` from the period cells.
pub fn statement_file_name(grid: &[Vec<String>]) -> Option<String> {
    let row = grid.get(4)?;
    let start = row.get(3).filter(|c| !is_blank(c))?;
    let end = row.get(5).filter(|c| !is_blank(c))?;
    Some(format!(
        "ICICI_Saving_{}_to_{}.xls",
        start.replace('/', "-"),
        end.replace('/', "-")
    ))
}

impl Importer for IciciSavingsXlsImporter {
    fn name(&self) -> &str {
        "icici_savings_xls"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if file.extension().as_deref() != Some("xls") {
            return false;
        }
        file.sheet(0)
            .is_ok_and(|grid| grid_text(&grid).contains(&self.account_number))
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let source = source_of(file);
        Ok(parse_rows(&file.sheet(0)?)?
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_transaction(&self.account, &source, i, None).into())
            .collect())
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.account.clone())
    }

    fn file_name(&self, file: &SourceFile) -> Result<Option<String>> {
        Ok(statement_file_name(&file.sheet(0)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec};

    fn sheet(body: &[[&str; 7]]) -> Vec<Vec<String>> {
        let mut g: Vec<Vec<String>> = vec![Vec::new(); HEADER_ROW];
        g[4] = ["", "", "Period", "01/12/2023", "to", "13/01/2024"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        g[7] = vec![String::new(), "Account Number".into(), "123456789012".into()];
        let header = [
            "",
            "S No.",
            "Value Date",
            "Transaction Date",
            "Transaction Remarks",
            "Withdrawal Amount (INR )",
            "Deposit Amount (INR )",
        ];
        g.push(header.iter().map(|s| s.to_string()).collect());
        for r in body {
            g.push(r.iter().map(|s| s.to_string()).collect());
        }
        g.extend(vec![vec!["Legends".to_string()]; FOOTER_ROWS]);
        g
    }

    #[test]
    fn test_withdrawal_and_deposit() {
        let g = sheet(&[
            ["", "1", "02/12/2023", "02/12/2023", "UPI/123/SHOP", "250.5", "0"],
            ["", "2", "05/12/2023", "05/12/2023", "NEFT-ACME", "0", "1000"],
        ]);
        let rows = parse_rows(&g).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2023, 12, 2));
        assert_eq!(rows[0].amount, dec("-250.5"));
        assert_eq!(rows[0].reference.as_deref(), Some("UPI/123/SHOP"));
        assert_eq!(rows[1].amount, dec("1000"));
        assert_eq!(
            statement_file_name(&g).as_deref(),
            Some("ICICI_Saving_01-12-2023_to_13-01-2024.xls")
        );
    }

    #[test]
    fn test_both_zero_is_an_error() {
        let g = sheet(&[["", "1", "02/12/2023", "02/12/2023", "ODD", "0", "0"]]);
        assert!(parse_rows(&g).is_err());
    }
}
