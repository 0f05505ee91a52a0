//! ICICI credit card yearly statement downloaded as XLS.

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;

use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{parse_amount, parse_date, DateOrder};
use rupeebean_core::table::Table;

use crate::importer::Importer;
use crate::parsers::source_of;
use crate::sheet::grid_text;
use crate::source::SourceFile;
use crate::types::StatementRow;

pub struct IciciCreditCardXlsImporter {
    last_four: String,
    account: String,
}

impl IciciCreditCardXlsImporter {
    pub fn new(last_four: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            last_four: last_four.into(),
            account: account.into(),
        }
    }
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2}/\d{2}/\d{4}) +to +(\d{2}/\d{2}/\d{4})").expect("icici period regex")
    })
}

/// Transaction table: from the row whose column B reads `Date` up to the
/// first row with an empty date.
pub fn transaction_table(grid: &[Vec<String>]) -> Result<Table> {
    let cell = |row: &Vec<String>| row.get(1).map(String::as_str).unwrap_or("").trim().to_string();
    let start = grid
        .iter()
        .position(|row| cell(row) == "Date")
        .ok_or_else(|| anyhow!("no row with `Date` in column B"))?;
    let end = grid[start + 1..]
        .iter()
        .position(|row| cell(row).is_empty())
        .map_or(grid.len(), |p| start + 1 + p);
    let rows: Vec<Vec<String>> = grid[start..end]
        .iter()
        .map(|row| row.iter().skip(1).cloned().collect())
        .collect();
    Table::from_grid(rows, 0)
}

pub fn parse_rows(grid: &[Vec<String>]) -> Result<Vec<StatementRow>> {
    let table = transaction_table(grid)?;
    let amount_col = table
        .column_matching(|h| h.starts_with("Amount"))
        .ok_or_else(|| anyhow!("no Amount column in {:?}", table.headers))?;
    let ref_col = table.column_matching(|h| h.contains("Ref"));

    let mut out = Vec::new();
    for row in &table.rows {
        let raw_date = table.get(row, "Date");
        let date = parse_date(raw_date, DateOrder::DayFirst)
            .ok_or_else(|| anyhow!("bad date {raw_date:?} in row {}", row.line))?;
        let raw = row.get(amount_col);
        // Charges are positive in the sheet.
        let amount = -parse_amount(raw).with_context(|| format!("amount {raw:?} on {date}"))?;
        let reference = ref_col.map(|c| row.get(c)).unwrap_or("");
        out.push(
            StatementRow::new(date, table.get(row, "Transaction Details"), amount)
                .with_reference(reference.replace('\r', " ")),
        );
    }
    Ok(out)
}

/// `ICICI_Statement_<start>_to_<end>.xls` from the printed period.
pub fn statement_file_name(text: &str) -> Option<String> {
    let c = period_re().captures(text)?;
    Some(format!(
        "ICICI_Statement_{}_to_{}.xls",
        c[1].replace('/', "-"),
        c[2].replace('/', "-")
    ))
}

impl Importer for IciciCreditCardXlsImporter {
    fn name(&self) -> &str {
        "icici_credit_card_xls"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if file.extension().as_deref() != Some("xls") {
            return false;
        }
        let Ok(grid) = file.sheet(0) else {
            return false;
        };
        let pattern = format!(r"Card Number.*{}", regex::escape(&self.last_four));
        Regex::new(&pattern).is_ok_and(|re| re.is_match(&grid_text(&grid)))
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
        Ok(statement_file_name(&grid_text(&file.sheet(0)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec, grid};

    fn sheet() -> Vec<Vec<String>> {
        grid(&[
            &["", "Credit Card Statement"],
            &["", "Card Number", "4375XXXXXXXX6006"],
            &["", "Statement period 01/04/2019 to 31/03/2020"],
            &[],
            &["", "Date", "Sr.No.", "Transaction Details", "Reward Point Header", "Amount(in ₹)", "Reference Number"],
            &["", "05/04/2019", "1", "SWIGGY BANGALORE", "10", "450.00", "7411"],
            &["", "10/04/2019", "2", "PAYMENT RECEIVED", "0", "-2000.00", ""],
            &["", "", "", "Total", "", "", ""],
            &["", "Some footer"],
        ])
    }

    #[test]
    fn test_rows_until_first_blank_date() {
        let rows = parse_rows(&sheet()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2019, 4, 5));
        assert_eq!(rows[0].amount, dec("-450.00"));
        assert_eq!(rows[0].reference.as_deref(), Some("7411"));
        assert_eq!(rows[1].amount, dec("2000.00"));
        assert_eq!(rows[1].reference, None);
    }

    #[test]
    fn test_statement_file_name() {
        let text = grid_text(&sheet());
        assert_eq!(
            statement_file_name(&text).as_deref(),
            Some("ICICI_Statement_01-04-2019_to_31-03-2020.xls")
        );
    }

    #[test]
    fn test_missing_header_errors() {
        assert!(parse_rows(&grid(&[&["", "nothing"]])).is_err());
    }
}
