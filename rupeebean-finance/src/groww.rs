//! Groww equity contract notes (password-protected PDF).
//!
//! One note covers one trading day. Trades are grouped per security and
//! side; buys open lots at cost, sells reduce lots FIFO-style with `{}` and
//! leave the gain to an auto-balanced capital gains posting.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use rupeebean_core::layout::PageLayout;
use rupeebean_core::ledger::{Amount, CostSpec, Directive, Posting, Source, Transaction, INR};
use rupeebean_core::parse::{is_blank, parse_amount, parse_date_fuzzy, DateOrder};
use rupeebean_core::table::{extract_table, ColumnSpec, TableSpec};
use rupeebean_ingest::importer::{strip_date_prefix, Importer};
use rupeebean_ingest::source::SourceFile;

use crate::bse::TickerLookup;

pub const TRADE_NO: &str = "Trade no.";
pub const DESCRIPTION: &str = "Security/Contract description";
pub const BUY_OR_SELL: &str = "Buy(B)/ Sell(S)";
pub const QUANTITY: &str = "Quantity";
pub const NET_RATE: &str = "Net Rate per Unit (Rs)";
pub const NET_TOTAL: &str = "Net Total (Before Levies) (Rs)";
pub const TRADE_DATE: &str = "Trade Date";

const PAYABLE: &str = "Net Amount Receivable / Payable By Client";
const OBLIGATION: &str = "Pay In / Pay Out Obligation";

pub struct GrowwImporter {
    strings_to_match: Vec<String>,
    password: String,
    tickers: Box<dyn TickerLookup>,
    wallet: String,
    holding_account: String,
    brokerage_account: String,
    capital_gains_account: String,
}

impl GrowwImporter {
    pub fn new(
        strings_to_match: Vec<String>,
        password: impl Into<String>,
        tickers: Box<dyn TickerLookup>,
    ) -> Self {
        Self {
            strings_to_match,
            password: password.into(),
            tickers,
            wallet: "Assets:Investments:Stocks:Groww:Cash".to_string(),
            holding_account: "Assets:Stocks:Groww".to_string(),
            brokerage_account: "Expenses:Investments:Stocks:Groww:Brokerage".to_string(),
            capital_gains_account: "Income:Groww:CapitalGains".to_string(),
        }
    }

    /// Account money is paid from on buys and into on sells.
    pub fn with_wallet(mut self, account: impl Into<String>) -> Self {
        self.wallet = account.into();
        self
    }

    pub fn with_holding_account(mut self, account: impl Into<String>) -> Self {
        self.holding_account = account.into();
        self
    }

    pub fn with_brokerage_account(mut self, account: impl Into<String>) -> Self {
        self.brokerage_account = account.into();
        self
    }

    pub fn with_capital_gains_account(mut self, account: impl Into<String>) -> Self {
        self.capital_gains_account = account.into();
        self
    }
}

fn isin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^INE\w+").expect("isin regex"))
}

fn summary_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Description\s+Equity").expect("summary regex"))
}

/// Captions are matched on the first header line only; the rest of a
/// wrapped caption sits in the header band below.
pub fn trades_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new("Order No.").optional(),
        ColumnSpec::new("Order Time").optional(),
        ColumnSpec::new(TRADE_NO),
        ColumnSpec::new("Trade Time").optional(),
        ColumnSpec::anchored(DESCRIPTION, "Security/Contract"),
        ColumnSpec::anchored(BUY_OR_SELL, "Buy(B)/"),
        ColumnSpec::new("Exchange").optional(),
        ColumnSpec::new(QUANTITY),
        ColumnSpec::new("Gross Rate").optional(),
        ColumnSpec::new("Brokerage").optional(),
        ColumnSpec::anchored(NET_RATE, "Net Rate"),
        ColumnSpec::new("Closing Rate").optional(),
        ColumnSpec::anchored(NET_TOTAL, "Net Total"),
        ColumnSpec::new("Remarks").optional(),
    ])
    .with_header_band(12.0)
    .with_footer(summary_start_re().clone())
}

pub fn summary_spec() -> TableSpec {
    TableSpec::new(vec![
        ColumnSpec::new("Description"),
        ColumnSpec::new("Equity"),
        ColumnSpec::new("Future & Options").optional(),
        ColumnSpec::new("Net Total").optional(),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub isin: String,
    pub side: Side,
    /// Negative for sells.
    pub quantity: Decimal,
    pub net_rate: Decimal,
    /// Negative for buys.
    pub net_total: Decimal,
}

/// Totals from the note's summary table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// Negative when the client pays.
    pub payable: Decimal,
    pub obligation: Decimal,
}

impl Settlement {
    /// Brokerage and levies, always positive.
    pub fn charges(&self) -> Decimal {
        (self.payable - self.obligation).abs()
    }
}

pub fn trade_date(pages: &[PageLayout]) -> Result<NaiveDate> {
    for page in pages {
        let lines = page.lines();
        for (i, line) in lines.iter().enumerate() {
            let text = line.text();
            let Some(pos) = text.find(TRADE_DATE) else {
                continue;
            };
            let rest = &text[pos + TRADE_DATE.len()..];
            let below = lines.get(i + 1).map(|l| l.text()).unwrap_or_default();
            if let Some(date) = parse_date_fuzzy(rest, DateOrder::DayFirst)
                .or_else(|| parse_date_fuzzy(&below, DateOrder::DayFirst))
            {
                return Ok(date);
            }
        }
    }
    bail!("no `{TRADE_DATE}` in contract note")
}

fn quantity_of(raw: &str) -> Option<Decimal> {
    raw.trim().replace(',', "").parse::<i64>().ok().map(Decimal::from)
}

/// Trades in note order, each tagged with the ISIN printed below its group.
pub fn parse_trades(pages: &[PageLayout]) -> Result<Vec<Trade>> {
    struct Pending {
        side: Side,
        quantity: Decimal,
        net_rate: Decimal,
        net_total: Decimal,
        isin: Option<String>,
    }

    let table = extract_table(pages, &trades_spec())?;
    let mut pending: Vec<Pending> = Vec::new();
    for row in &table.rows {
        let description = table.get(row, DESCRIPTION).trim();
        if let Some(m) = isin_re().find(description) {
            for p in pending.iter_mut().rev().take_while(|p| p.isin.is_none()) {
                p.isin = Some(m.as_str().to_string());
            }
            continue;
        }
        if is_blank(table.get(row, TRADE_NO)) {
            continue;
        }
        let side = match table.get(row, BUY_OR_SELL).trim() {
            "B" => Side::Buy,
            "S" => Side::Sell,
            other => {
                debug!(side = other, page = row.page, "not a trade row");
                continue;
            }
        };
        let Some(quantity) = quantity_of(table.get(row, QUANTITY)) else {
            debug!(page = row.page, line = row.line, "trade row without quantity");
            continue;
        };
        let net_rate = parse_amount(table.get(row, NET_RATE))
            .with_context(|| format!("net rate on page {}", row.page))?;
        let net_total = parse_amount(table.get(row, NET_TOTAL))
            .with_context(|| format!("net total on page {}", row.page))?;
        pending.push(Pending {
            side,
            quantity,
            net_rate,
            net_total,
            isin: None,
        });
    }

    pending
        .into_iter()
        .map(|p| {
            let isin = p.isin.ok_or_else(|| anyhow!("trade without an ISIN below it"))?;
            Ok(Trade {
                isin,
                side: p.side,
                quantity: p.quantity,
                net_rate: p.net_rate,
                net_total: p.net_total,
            })
        })
        .collect()
}

pub fn parse_settlement(pages: &[PageLayout]) -> Result<Settlement> {
    let table = extract_table(pages, &summary_spec())?;
    let mut payable = None;
    let mut obligation = None;
    for row in &table.rows {
        let label = table.get(row, "Description");
        let Ok(value) = parse_amount(table.get(row, "Equity")) else {
            continue;
        };
        if label.contains("Receivable") || label.contains("Payable By Client") {
            payable = payable.or(Some(value));
        } else if label.contains("Pay In") || label.contains("Obligation") {
            obligation = obligation.or(Some(value));
        }
    }
    match (payable, obligation) {
        (Some(payable), Some(obligation)) => Ok(Settlement { payable, obligation }),
        _ => bail!(
            "summary table lacks `{PAYABLE}` or `{OBLIGATION}` ({} rows read)",
            table.rows.len()
        ),
    }
}

/// Rate times quantity must add up to the trade totals and, with charges,
/// to what the client pays.
pub fn check_totals(trades: &[Trade], settlement: &Settlement) -> Result<()> {
    let gross: Decimal = trades.iter().map(|t| t.net_rate * t.quantity).sum();
    let total: Decimal = trades.iter().map(|t| t.net_total).sum();
    if gross != -total {
        bail!("sum of trades {gross} does not match the note total {total}");
    }
    let charges = settlement.charges();
    if gross + charges != -settlement.payable {
        bail!(
            "trades {gross} plus charges {charges} do not match the net amount {}",
            settlement.payable
        );
    }
    Ok(())
}

impl GrowwImporter {
    pub fn build_entries(
        &self,
        date: NaiveDate,
        trades: &[Trade],
        settlement: &Settlement,
        source: &Source,
        document: &str,
    ) -> Result<Vec<Directive>> {
        check_totals(trades, settlement)?;

        let mut out: Vec<Directive> = Vec::new();
        out.push(
            Transaction::new(
                source.clone(),
                date,
                format!("Trades from Groww Contract Note on {date}"),
            )
            .with_tag("groww")
            .with_meta("document", document)
            .with_posting(Posting::new(&self.brokerage_account, Amount::inr(settlement.charges())))
            .with_posting(Posting::auto(&self.wallet))
            .into(),
        );

        let mut groups: BTreeMap<(&str, Side), Vec<&Trade>> = BTreeMap::new();
        for t in trades {
            groups.entry((t.isin.as_str(), t.side)).or_default().push(t);
        }
        for ((isin, side), group) in groups {
            let ticker = self.tickers.isin_to_ticker(isin)?;
            let spent: Decimal = group.iter().map(|t| t.net_total).sum();
            let mut txn = Transaction::new(source.clone(), date, "trade")
                .with_tag("groww")
                .with_meta("document", document)
                .with_posting(Posting::new(&self.wallet, Amount::inr(spent)));
            if side == Side::Sell {
                txn = txn.with_posting(Posting::auto(format!(
                    "{}:{ticker}",
                    self.capital_gains_account
                )));
            }

            let mut lots: BTreeMap<Decimal, Decimal> = BTreeMap::new();
            for t in &group {
                *lots.entry(t.net_rate).or_default() += t.quantity;
            }
            for (rate, quantity) in lots {
                let units = Amount::new(quantity, ticker.clone());
                let account = format!("{}:{ticker}", self.holding_account);
                let posting = match side {
                    Side::Buy => Posting::new(account, units)
                        .with_cost(CostSpec::per_unit(rate, INR, date)),
                    Side::Sell => Posting::new(account, units)
                        .with_cost(CostSpec::empty())
                        .with_price(Amount::inr(rate)),
                };
                txn = txn.with_posting(posting);
            }
            out.push(txn.into());
        }
        info!(trades = trades.len(), entries = out.len(), %date, "contract note parsed");
        Ok(out)
    }
}

impl Importer for GrowwImporter {
    fn name(&self) -> &str {
        "groww"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        if file.mime_type() != Some("application/pdf") {
            return false;
        }
        match file.pdf_text(Some(&self.password)) {
            Ok(text) => self.strings_to_match.iter().all(|s| text.contains(s.as_str())),
            Err(e) => {
                debug!(file = %file.name(), error = %e, "cannot read pdf");
                false
            }
        }
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        let pages = file.pages(Some(&self.password))?;
        let date = trade_date(&pages)?;
        let trades = parse_trades(&pages)?;
        let settlement = parse_settlement(&pages)?;
        let source = Source::new(file.path().display().to_string(), 0);
        self.build_entries(date, &trades, &settlement, &source, &file.name())
            .with_context(|| format!("contract note {}", file.name()))
    }

    fn file_account(&self, _file: &SourceFile) -> Result<String> {
        Ok(self.wallet.clone())
    }

    fn file_date(&self, file: &SourceFile) -> Result<Option<NaiveDate>> {
        Ok(Some(trade_date(&file.pages(Some(&self.password))?)?))
    }

    fn file_name(&self, file: &SourceFile) -> Result<Option<String>> {
        Ok(Some(strip_date_prefix(&file.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupeebean_core::layout::Word;
    use rupeebean_core::render::render_all;

    struct Tickers;

    impl TickerLookup for Tickers {
        fn isin_to_ticker(&self, isin: &str) -> Result<String> {
            match isin {
                "INE002A01018" => Ok("RELIANCE".to_string()),
                "INE009A01021" => Ok("INFY".to_string()),
                other => bail!("unknown ISIN {other}"),
            }
        }
    }

    fn line(cells: &[(&str, f64)], top: f64) -> Vec<Word> {
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

    fn trade(no: &str, desc: &str, side: &str, qty: &str, rate: &str, total: &str, top: f64) -> Vec<Word> {
        line(
            &[(no, 30.0), (desc, 90.0), (side, 210.0), (qty, 260.0), (rate, 320.0), (total, 420.0)],
            top,
        )
    }

    fn note() -> PageLayout {
        let lines = vec![
            line(&[(TRADE_DATE, 30.0), ("05-01-2024", 120.0)], 40.0),
            line(
                &[
                    ("Trade no.", 30.0),
                    ("Security/Contract", 90.0),
                    ("Buy(B)/", 200.0),
                    ("Quantity", 250.0),
                    ("Net Rate", 320.0),
                    ("Net Total", 420.0),
                ],
                100.0,
            ),
            line(
                &[
                    ("description", 90.0),
                    ("Sell(S)", 200.0),
                    ("per Unit (Rs)", 320.0),
                    ("(Before Levies) (Rs)", 420.0),
                ],
                110.0,
            ),
            trade("1001", "RELIANCE", "B", "10", "2500.00", "-25000.00", 130.0),
            trade("1002", "RELIANCE", "B", "5", "2510.00", "-12550.00", 145.0),
            line(&[("INE002A01018", 90.0)], 160.0),
            trade("1003", "INFOSYS", "S", "-4", "1500.00", "6000.00", 175.0),
            trade("1004", "INFOSYS", "S", "-2", "1500.00", "3000.00", 190.0),
            line(&[("INE009A01021", 90.0)], 205.0),
            line(
                &[
                    ("Description", 30.0),
                    ("Equity", 350.0),
                    ("Future & Options", 420.0),
                    ("Net Total", 520.0),
                ],
                260.0,
            ),
            line(&[(OBLIGATION, 30.0), ("-28550.00", 350.0), ("0.00", 420.0), ("-28550.00", 520.0)], 280.0),
            line(&[(PAYABLE, 30.0), ("-28580.50", 350.0), ("0.00", 420.0), ("-28580.50", 520.0)], 295.0),
        ];
        PageLayout::new(1, 595.0, 842.0).with_words(lines.into_iter().flatten().collect())
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_trade_date() {
        assert_eq!(trade_date(&[note()]).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_trades_get_isin_from_line_below() {
        let trades = parse_trades(&[note()]).unwrap();
        assert_eq!(trades.len(), 4);
        assert_eq!(trades[0].isin, "INE002A01018");
        assert_eq!(trades[1].isin, "INE002A01018");
        assert_eq!(trades[2].isin, "INE009A01021");
        assert_eq!(trades[2].side, Side::Sell);
        assert_eq!(trades[2].quantity, dec("-4"));
        assert_eq!(trades[0].net_total, dec("-25000.00"));
    }

    #[test]
    fn test_settlement() {
        let s = parse_settlement(&[note()]).unwrap();
        assert_eq!(s.payable, dec("-28580.50"));
        assert_eq!(s.obligation, dec("-28550.00"));
        assert_eq!(s.charges(), dec("30.50"));
    }

    #[test]
    fn test_entries() {
        let imp = GrowwImporter::new(vec![], "pw", Box::new(Tickers));
        let pages = [note()];
        let date = trade_date(&pages).unwrap();
        let out = imp
            .build_entries(
                date,
                &parse_trades(&pages).unwrap(),
                &parse_settlement(&pages).unwrap(),
                &Source::new("cn.pdf", 0),
                "cn.pdf",
            )
            .unwrap();
        assert_eq!(out.len(), 3);
        let text = render_all(&out);
        assert!(text.starts_with(
            "2024-01-05 * \"Trades from Groww Contract Note on 2024-01-05\" #groww\n  document: \"cn.pdf\"\n  Expenses:Investments:Stocks:Groww:Brokerage  30.50 INR\n  Assets:Investments:Stocks:Groww:Cash\n"
        ));
        assert!(text.contains("  Assets:Investments:Stocks:Groww:Cash  -37550.00 INR\n"));
        assert!(text.contains("  Assets:Stocks:Groww:RELIANCE  10 RELIANCE {2500.00 INR, 2024-01-05}\n"));
        assert!(text.contains("  Assets:Stocks:Groww:RELIANCE  5 RELIANCE {2510.00 INR, 2024-01-05}\n"));
        assert!(text.contains("  Assets:Investments:Stocks:Groww:Cash  9000.00 INR\n  Income:Groww:CapitalGains:INFY\n"));
        assert!(text.contains("  Assets:Stocks:Groww:INFY  -6 INFY {} @ 1500.00 INR\n"));
    }

    #[test]
    fn test_mismatched_totals_are_errors() {
        let imp = GrowwImporter::new(vec![], "pw", Box::new(Tickers));
        let pages = [note()];
        let mut trades = parse_trades(&pages).unwrap();
        trades[0].net_total = dec("-24000.00");
        let settlement = parse_settlement(&pages).unwrap();
        let date = trade_date(&pages).unwrap();
        assert!(imp
            .build_entries(date, &trades, &settlement, &Source::new("cn.pdf", 0), "cn.pdf")
            .is_err());
    }
}
