//! Bank- and wallet-specific importers.

pub mod axis_credit_card;
pub mod boi;
pub mod canara_savings;
pub mod hdfc_credit_card;
pub mod hdfc_savings;
pub mod hsbc;
pub mod icici_credit_card_csv;
pub mod icici_credit_card_email;
pub mod icici_credit_card_xls;
pub mod icici_savings_csv;
pub mod icici_savings_email;
pub mod icici_savings_xls;
pub mod paytm;
pub mod phonepe;
pub mod sbi;
pub mod sbi_email;

use tracing::debug;

use rupeebean_core::ledger::Source;

use crate::source::SourceFile;

pub(crate) fn source_of(file: &SourceFile) -> Source {
    Source::new(file.path().display().to_string(), 0)
}

pub(crate) fn is_pdf(file: &SourceFile) -> bool {
    file.mime_type() == Some("application/pdf")
}

/// PDF whose text contains every needle. Unreadable files are not ours.
pub(crate) fn pdf_contains_all(file: &SourceFile, password: Option<&str>, needles: &[&str]) -> bool {
    if !is_pdf(file) {
        return false;
    }
    match file.pdf_text(password) {
        Ok(text) => needles.iter().all(|n| text.contains(n)),
        Err(e) => {
            debug!(file = %file.name(), error = %e, "cannot read pdf");
            false
        }
    }
}

/// Like [`pdf_contains_all`], looking at the first page only.
pub(crate) fn first_page_contains_all(
    file: &SourceFile,
    password: Option<&str>,
    needles: &[&str],
) -> bool {
    if !is_pdf(file) {
        return false;
    }
    match file.pages(password) {
        Ok(pages) => pages
            .first()
            .map(|p| p.text())
            .is_some_and(|text| needles.iter().all(|n| text.contains(n))),
        Err(e) => {
            debug!(file = %file.name(), error = %e, "cannot read pdf");
            false
        }
    }
}

/// `mask_len` X's followed by the last four digits, as statements print it.
pub(crate) fn masked_account(number: &str, mask_len: usize) -> String {
    let chars: Vec<char> = number.chars().collect();
    let last_four: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}{}", "X".repeat(mask_len), last_four)
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use rupeebean_core::layout::{PageLayout, Rule, Word};

    /// Lay out `cells` at the given x positions on one text line.
    pub(crate) fn line(cells: &[(&str, f64)], top: f64) -> Vec<Word> {
        let mut out = Vec::new();
        for &(text, x) in cells {
            let mut cursor = x;
            for token in text.split_whitespace() {
                let width = 5.0 * token.chars().count() as f64;
                out.push(Word::new(token, cursor, cursor + width, top, top + 8.0));
                cursor += width + 3.0;
            }
        }
        out
    }

    pub(crate) fn page_n(number: usize, lines: Vec<Vec<Word>>, rules: Vec<Rule>) -> PageLayout {
        PageLayout::new(number, 595.0, 842.0)
            .with_words(lines.into_iter().flatten().collect())
            .with_rules(rules)
    }

    pub(crate) fn page(lines: Vec<Vec<Word>>, rules: Vec<Rule>) -> PageLayout {
        page_n(1, lines, rules)
    }

    pub(crate) fn rule(y: f64) -> Rule {
        Rule { x0: 30.0, x1: 570.0, y }
    }

    pub(crate) fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub(crate) fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    pub(crate) fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_account() {
        assert_eq!(masked_account("30012345678", 7), "XXXXXXX5678");
        assert_eq!(masked_account("123", 2), "XX123");
    }

    #[test]
    fn test_non_pdf_is_never_identified() {
        let file = SourceFile::new("statement.csv");
        assert!(!pdf_contains_all(&file, None, &["anything"]));
        assert!(!first_page_contains_all(&file, None, &["anything"]));
    }
}
