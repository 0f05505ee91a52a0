//! ICICI credit card statement sent by e-mail (password-protected PDF).
//!
//! Only the first page is read, and only a fixed area of it: the rest of
//! the layout is promotional noise.

use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::Directive;
use rupeebean_core::parse::{credit_marked_amount, is_blank, parse_date_fuzzy, DateOrder};
use rupeebean_core::table::{extract_table, ColumnMode, ColumnSpec, TableSpec};

use crate::importer::Importer;
use crate::parsers::{first_page_contains_all, source_of};
use crate::source::SourceFile;
use crate::types::StatementRow;

pub const DATE: &str = "Date";
pub const REFERENCE: &str = "SerNo.";
pub const NARRATION: &str = "Transaction Details";
pub const REWARD_POINTS: &str = "Reward Points";
pub const INTERNATIONAL_AMOUNT: &str = "Intl.# amount";
pub const AMOUNT: &str = "Amount (in`)";

/// Column separators, in points from the left edge.
pub const COLUMN_SEPARATORS: [f64; 5] = [250.0, 300.0, 435.0, 470.0, 520.0];
/// Table area as (left, bottom, right, top) in PDF units, origin bottom-left.
pub const TABLE_AREA: (f64, f64, f64, f64) = (205.0, 160.0, 600.0, 475.0);

pub struct IciciCreditCardEmailImporter {
    lines_to_grep: Vec<String>,
    password: String,
    account: String,
    card_holders: Vec<String>,
}

impl IciciCreditCardEmailImporter {
    pub fn new(
        lines_to_grep: Vec<String>,
        password: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self> {
        if lines_to_grep.is_empty() {
            bail!("icici_credit_card_email needs at least one line to identify statements");
        }
        Ok(Self {
            lines_to_grep,
            password: password.into(),
            account: account.into(),
            card_holders: Vec::new(),
        })
    }

    /// Names printed above each card holder's block of transactions.
    pub fn with_card_holders(mut self, names: Vec<String>) -> Self {
        self.card_holders = names;
        self
    }
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+([.,]\d+)*").expect("icici amount regex"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new(DATE),
        ColumnSpec::new(REFERENCE),
        ColumnSpec::new(NARRATION),
        ColumnSpec::new(REWARD_POINTS),
        ColumnSpec::new(INTERNATIONAL_AMOUNT),
        ColumnSpec::new(AMOUNT),
    ])
    .with_column_mode(ColumnMode::Fixed(COLUMN_SEPARATORS.to_vec()))
    .with_row_tolerance(10.0)
}

/// The transaction area of the first page, in top-down coordinates.
pub fn table_area(page: &PageLayout) -> PageLayout {
    let (left, bottom, right, top) = TABLE_AREA;
    page.crop(left, page.height - top, right, page.height - bottom)
}

pub fn parse_rows(page: &PageLayout, card_holders: &[String]) -> Result<Vec<StatementRow>> {
    let area = table_area(page);
    let table = extract_table(std::slice::from_ref(&area), &table_spec())?;
    let mut holder: Option<String> = None;
    let mut out = Vec::new();
    for row in &table.rows {
        let narration = table.get(row, NARRATION).trim();
        if let Some(name) = card_holders.iter().find(|n| narration.starts_with(n.as_str())) {
            holder = Some(name.clone());
        }
        let Some(date) = parse_date_fuzzy(table.get(row, DATE), DateOrder::DayFirst) else {
            continue;
        };
        let raw = table.get(row, AMOUNT).trim();
        if !amount_re().is_match(raw) {
            continue;
        }
        let amount = credit_marked_amount(raw).with_context(|| format!("amount {raw:?} on {date}"))?;
        let intl = table.get(row, INTERNATIONAL_AMOUNT).trim();
        let narration = if is_blank(intl) {
            narration.to_string()
        } else {
            format!("{narration} :: Intl. Amount: {intl}")
        };
        let mut parsed = StatementRow::new(date, narration, amount);
        if let Some(name) = &holder {
            parsed = parsed.with_meta("card_holder", name.clone());
        }
        out.push(parsed);
    }
    Ok(out)
}

impl Importer for IciciCreditCardEmailImporter {
    fn name(&self) -> &str {
        "icici_credit_card_email"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        let needles: Vec<&str> = self.lines_to_grep.iter().map(String::as_str).collect();
        first_page_contains_all(file, Some(&self.password), &needles)
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let pages = file.pages(Some(&self.password))?;
        let Some(first) = pages.first() else {
            bail!("{} has no pages", file.name());
        };
        let source = source_of(file);
        let document = file.name();
        Ok(parse_rows(first, &self.card_holders)?
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
}
