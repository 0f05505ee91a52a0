//! Bank of India account enquiry statement saved as DOCX.

use anyhow::{bail, Context, Result};
use tracing::info;

use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::Table;

use crate::docx::{self, Grid};
use crate::importer::Importer;
use crate::parsers::source_of;
use crate::source::SourceFile;
use crate::types::StatementRow;

const DATE: &str = "Value Date";
const NARRATION: &str = "Narration";
// Spelled as printed.
const WITHDRAWAL: &str = "Withdrawl";
const DEPOSIT: &str = "Deposit";
const CHEQUE: &str = "Chq. No.";

pub struct BoiImporter {
    account_number: String,
    account: String,
}

impl BoiImporter {
    pub fn new(account_number: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            account_number: account_number.into(),
            account: account.into(),
        }
    }
}

/// First table whose header row mentions a date.
pub fn transaction_table(tables: Vec<Grid>) -> Result<Table> {
    let Some(grid) = tables.into_iter().find(|t| {
        t.first()
            .is_some_and(|header| header.join(" ").to_lowercase().contains("date"))
    }) else {
        bail!("no transaction table in document");
    };
    Table::from_grid(grid, 0)
}

pub fn parse_rows(table: &Table) -> Result<Vec<StatementRow>> {
    let mut out = Vec::new();
    for row in &table.rows {
        let raw_date = table.get(row, DATE);
        let Some(date) = parse_date(raw_date, DateOrder::DayFirst) else {
            info!(date = raw_date, "skipping row without a value date");
            continue;
        };
        let withdrawal = table.get(row, WITHDRAWAL);
        let amount = if !is_blank(withdrawal) {
            -parse_amount(withdrawal).with_context(|| format!("withdrawal on {date}"))?
        } else {
            let deposit = table.get(row, DEPOSIT);
            parse_amount(deposit).with_context(|| format!("deposit {deposit:?} on {date}"))?
        };
        let narration = table.get(row, NARRATION).trim();
        let mut parsed = StatementRow::new(date, narration, amount).with_reference(narration);
        let cheque = table.get(row, CHEQUE).trim();
        if !cheque.is_empty() {
            parsed = parsed.with_meta("cheque_number", cheque);
        }
        out.push(parsed);
    }
    // Enquiries list the latest entry first.
    if let (Some(first), Some(last)) = (out.first(), out.last()) {
        if first.date > last.date {
            out.reverse();
        }
    }
    Ok(out)
}

impl Importer for BoiImporter {
    fn name(&self) -> &str {
        "boi"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if !file.name().ends_with("docx") {
            return false;
        }
        docx::read_text(file.path()).is_ok_and(|text| text.contains(&self.account_number))
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let table = transaction_table(docx::read_tables(file.path())?)?;
        let source = source_of(file);
        Ok(parse_rows(&table)?
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
    use crate::docx::tests::{document, write_docx};
    use crate::parsers::testing::{d, dec};

    fn statement() -> String {
        document(
            &[
                vec!["Value Date", "Chq. No.", "Narration", "Withdrawl", "Deposit", "Balance"],
                vec!["05-04-2024", "", "NEFT SALARY ", "", "50,000.00 Cr", "60,000.00"],
                vec!["03-04-2024", "000123", "CHQ PAID", "1,000.00 Dr", "", "10,000.00"],
                vec!["Total", "", "", "", "", ""],
            ],
            "Account No 4455667788",
        )
    }

    #[test]
    fn test_rows_reversed_into_date_order() {
        let tables = docx::tables_from_xml(&statement());
        let rows = parse_rows(&transaction_table(tables).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2024, 4, 3));
        assert_eq!(rows[0].amount, dec("-1000.00"));
        assert_eq!(rows[0].meta.get("cheque_number"), Some("000123"));
        assert_eq!(rows[1].narration, "NEFT SALARY");
        assert_eq!(rows[1].reference.as_deref(), Some("NEFT SALARY"));
        assert_eq!(rows[1].amount, dec("50000.00"));
    }

    #[test]
    fn test_identify_and_extract_from_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enquiry.docx");
        write_docx(&path, &statement());
        let file = SourceFile::new(path.clone());
        let imp = BoiImporter::new("4455667788", "Assets:Bank:BOI");
        assert!(imp.identify(&file));
        assert!(!BoiImporter::new("999", "Assets:Bank:BOI").identify(&file));

        let directives = imp.extract(&file).unwrap();
        assert_eq!(directives.len(), 2);
        match &directives[1] {
            Directive::Transaction(t) => {
                assert_eq!(t.postings[0].account, "Assets:Bank:BOI");
                assert_eq!(t.postings[0].meta.get("transaction_ref"), Some("NEFT SALARY"));
            }
            other => panic!("unexpected directive {other:?}"),
        }
    }
}
