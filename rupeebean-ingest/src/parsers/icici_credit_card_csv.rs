//! ICICI credit card monthly statement (CSV).

use anyhow::Result;

use crate::csv_importer::{CsvColumns, CsvImporter};

pub fn importer(last_four: &str, account: &str, invert_sign: bool) -> Result<CsvImporter> {
    let columns = CsvColumns {
        date: 0,
        reference: Some(1),
        narration: 2,
        amount: Some(5),
        drcr: Some(6),
        ..Default::default()
    };
    let content = format!("X{{8}}{}", regex::escape(last_four));
    Ok(CsvImporter::new("icici_credit_card_csv", account, columns, &content)?
        .with_skip_lines(8)
        .with_invert_sign(invert_sign)
        .with_mime("text/csv"))
}
