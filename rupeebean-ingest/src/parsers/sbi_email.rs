//! SBI e-mailed account statement (password-protected PDF, ruled table).

use anyhow::{Context, Result};

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{is_blank, parse_amount, parse_date, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, RowBreak, TableSpec};

use crate::importer::{statement_balances, Importer};
use crate::parsers::{masked_account, pdf_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub struct SbiEmailImporter {
    account_number: String,
    name_in_file: String,
    password: String,
    account: String,
}

impl SbiEmailImporter {
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

    fn masked_account(&self) -> String {
        masked_account(&self.account_number, 7)
    }
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new("Date"),
        ColumnSpec::anchored("Value Date", "Value Date").optional(),
        ColumnSpec::anchored("Transaction Reference", "Transaction"),
        ColumnSpec::anchored("Ref.No./Chq.No.", "Ref.No./Chq.No."),
        ColumnSpec::new("Debit"),
        ColumnSpec::new("Credit"),
        ColumnSpec::new("Balance"),
    ])
    .with_row_break(RowBreak::Rules { min_width: 100.0 })
    .with_header_band(12.0)
}

pub fn parse_rows(pages: &[PageLayout]) -> Result<Vec<StatementRow>> {
    let table = extract_table(pages, &table_spec())?;
    let mut out = Vec::new();
    for row in &table.rows {
        let balance = table.get(row, "Balance");
        if is_blank(balance) || balance.trim() == "null" {
            continue;
        }
        let Some(date) = parse_date(table.get(row, "Date"), DateOrder::DayFirst) else {
            continue;
        };
        let debit = table.get(row, "Debit");
        let amount = if !is_blank(debit.trim_matches('-')) {
            -parse_amount(debit).with_context(|| format!("debit {debit:?} on {date}"))?
        } else {
            let credit = table.get(row, "Credit");
            parse_amount(credit).with_context(|| format!("credit {credit:?} on {date}"))?
        };
        out.push(
            StatementRow::new(date, table.get(row, "Transaction Reference").trim(), amount)
                .with_balance(parse_amount(balance).ok())
                .with_reference(table.get(row, "Ref.No./Chq.No.")),
        );
    }
    Ok(out)
}

impl Importer for SbiEmailImporter {
    fn name(&self) -> &str {
        "sbi_email"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        let masked = self.masked_account();
        pdf_contains_all(file, Some(&self.password), &[&masked, &self.name_in_file])
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
    use crate::parsers::testing::{dec, line, page, rule};

    #[test]
    fn test_masked_account() {
        let imp = SbiEmailImporter::new("30012345678", "Mr. A", "pw", "Assets:SBI");
        assert_eq!(imp.masked_account(), "XXXXXXX5678");
    }

    #[test]
    fn test_rows_without_balance_are_skipped() {
        let x = [40.0, 110.0, 260.0, 360.0, 430.0, 500.0];
        let p = page(
            vec![
                line(
                    &[
                        ("Date", x[0]),
                        ("Transaction", x[1]),
                        ("Ref.No./Chq.No.", x[2]),
                        ("Debit", x[3]),
                        ("Credit", x[4]),
                        ("Balance", x[5]),
                    ],
                    100.0,
                ),
                line(&[("Reference", x[1])], 110.0),
                line(
                    &[
                        ("02-04-2024", x[0]),
                        ("BY TRANSFER", x[1]),
                        ("TRF 99", x[2]),
                        ("-", x[3]),
                        ("1,500.00", x[4]),
                        ("11,500.00", x[5]),
                    ],
                    130.0,
                ),
                line(&[("NEFT ACME", x[1])], 140.0),
                line(&[("03-04-2024", x[0]), ("BROUGHT FWD", x[1]), ("null", x[5])], 160.0),
                line(
                    &[
                        ("04-04-2024", x[0]),
                        ("ATM WDL", x[1]),
                        ("200.00", x[3]),
                        ("11,300.00", x[5]),
                    ],
                    190.0,
                ),
            ],
            vec![rule(125.0), rule(155.0), rule(185.0), rule(205.0)],
        );
        let rows = parse_rows(&[p]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].narration, "BY TRANSFER NEFT ACME");
        assert_eq!(rows[0].amount, dec("1500.00"));
        assert_eq!(rows[0].reference.as_deref(), Some("TRF 99"));
        assert_eq!(rows[0].balance, Some(dec("11500.00")));
        assert_eq!(rows[1].amount, dec("-200.00"));
    }
}
