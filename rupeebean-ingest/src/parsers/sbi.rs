//! SBI net-banking account statement (PDF, ruled table).
//!
//! Columns: Txn Date | Value Date | Description | Ref No./Cheque No. |
//! Debit | Credit | Balance. Cells wrap inside ruled rows.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, RowBreak, TableSpec};

use crate::importer::Importer;
use crate::parsers::{pdf_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub struct SbiImporter {
    account_number: String,
    account: String,
}

impl SbiImporter {
    pub fn new(account_number: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            account: account.into(),
        }
    }
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::anchored("Txn Date", "Txn Date"),
        ColumnSpec::anchored("Value Date", "Value Date").optional(),
        ColumnSpec::new("Description"),
        ColumnSpec::anchored("Ref", "Ref").optional(),
        ColumnSpec::new("Debit"),
        ColumnSpec::new("Credit"),
        ColumnSpec::new("Balance").optional(),
    ])
    .with_row_break(RowBreak::Rules { min_width: 100.0 })
    .with_header_band(12.0)
}

/// `TO TRANSFER-UPI/DR/123/SHOP-` keeps only the middle part.
pub fn clean_description(desc: &str) -> String {
    let desc = desc.replace('\r', " ");
    if desc.matches('-').count() == 2 {
        if let Some(mid) = desc.split('-').nth(1) {
            return mid.trim().to_string();
        }
    }
    desc.trim().to_string()
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut out = Vec::new();
    for row in &table.rows {
        let Some(date) = parse_date(table.get(row, "Txn Date"), DateOrder::DayFirst) else {
            continue;
        };
        let debit = table.get(row, "Debit");
        let credit = table.get(row, "Credit");
        let amount: Decimal = if !is_blank(debit) {
            -parse_amount(debit).with_context(|| format!("debit on page {}", row.page))?
        } else if !is_blank(credit) {
            parse_amount(credit).with_context(|| format!("credit on page {}", row.page))?
        } else {
            bail!("row dated {date} on page {} has neither debit nor credit", row.page);
        };
        out.push(
            StatementRow::new(date, clean_description(table.get(row, "Description")), amount)
                .with_reference(table.get(row, "Ref")),
        );
    }
    Ok(out)
}

impl Importer for SbiImporter {
    fn name(&self) -> &str {
        "sbi"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        pdf_contains_all(file, None, &[self.account_number.as_str()])
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{dec, line, page, rule};

    #[test]
    fn test_clean_description() {
        assert_eq!(clean_description("TO TRANSFER-UPI/DR/1234/SHOP/YBL-"), "UPI/DR/1234/SHOP/YBL");
        assert_eq!(clean_description("BY CLEARING"), "BY CLEARING");
    }

    #[test]
    fn test_parse_ruled_rows() {
        let cols = [40.0, 100.0, 160.0, 300.0, 400.0, 470.0, 540.0];
        let header = [
            ("Txn Date", cols[0]),
            ("Value Date", cols[1]),
            ("Description", cols[2]),
            ("Ref No./Cheque", cols[3]),
            ("Debit", cols[4]),
            ("Credit", cols[5]),
            ("Balance", cols[6]),
        ];
        let p = page(
            vec![
                line(&header, 100.0),
                line(&[("No.", cols[3])], 110.0),
                line(
                    &[
                        ("1 Apr", cols[0]),
                        ("1 Apr", cols[1]),
                        ("TO TRANSFER-UPI/DR/", cols[2]),
                        ("TRANSFER TO", cols[3]),
                        ("250.00", cols[4]),
                        ("9,750.00", cols[6]),
                    ],
                    130.0,
                ),
                line(&[("2024", cols[0]), ("2024", cols[1]), ("9/SHOP-", cols[2]), ("4897", cols[3])], 140.0),
                line(
                    &[
                        ("3 Apr 2024", cols[0]),
                        ("3 Apr 2024", cols[1]),
                        ("BY SALARY", cols[2]),
                        ("1,000.00", cols[5]),
                        ("10,750.00", cols[6]),
                    ],
                    170.0,
                ),
            ],
            vec![rule(125.0), rule(160.0), rule(185.0)],
        );
        let rows = parse_rows(&[p]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].narration, "UPI/DR/ 9/SHOP");
        assert_eq!(rows[0].amount, dec("-250.00"));
        assert_eq!(rows[0].reference.as_deref(), Some("TRANSFER TO 4897"));
        assert_eq!(rows[1].amount, dec("1000.00"));
        assert_eq!(rows[1].reference, None);
    }
}
