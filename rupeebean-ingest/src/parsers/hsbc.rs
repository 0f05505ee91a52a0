//! HSBC savings transaction history (CSV).

use anyhow::Result;
use tracing::warn;

use crate::csv_importer::{CsvColumns, CsvImporter};

/// Rows look like `26/01/2020,TRANSFER ...,-1200.00,45000.00`.
pub const CONTENT: &str = r"^ *\d{2}/\d{2}/\d{4}, *TRANSFER";

pub fn importer(account: &str) -> Result<CsvImporter> {
    warn!(
        account,
        "HSBC exports carry no account number; every HSBC export will match this account"
    );
    let columns = CsvColumns {
        date: 0,
        narration: 1,
        amount: Some(2),
        balance: Some(3),
        ..Default::default()
    };
    Ok(CsvImporter::new("hsbc", account, columns, CONTENT)?.with_mime("text/csv"))
}
