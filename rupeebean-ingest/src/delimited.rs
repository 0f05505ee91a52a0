//! CSV exports as rows of trimmed strings.

use anyhow::{Context, Result};
use csv::ReaderBuilder;

/// Parse `text` after dropping its first `skip_lines` lines.
///
/// Rows may have differing lengths; there is no header handling.
pub fn read_records(text: &str, skip_lines: usize) -> Result<Vec<Vec<String>>> {
    let body: String = text
        .lines()
        .skip(skip_lines)
        .map(|l| format!("{l}\n"))
        .collect();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("csv record {}", i + skip_lines + 1))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}
