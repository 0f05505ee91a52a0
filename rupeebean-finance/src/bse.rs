//! Bombay Stock Exchange company list and prices.
//!
//! The active-equity list is cached in `bse.json` and refreshed when it is
//! more than two days old. Refreshing merges by ISIN so companies that drop
//! off the exchange list stay resolvable.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, info};

use rupeebean_core::ledger::{Commodity, Directive, Meta};
use rupeebean_core::render::render_all;

pub const TICKER_KEY: &str = "scrip_id";
pub const ISIN_KEY: &str = "ISIN_NUMBER";
pub const SCRIP_CODE_KEY: &str = "SCRIP_CD";
/// Weighted average price in the quote response.
pub const PRICE_KEY: &str = "wap";

/// Price source named in commodity metadata; see [`crate::yahoo`].
pub const PRICE_SOURCE: &str = "rupeebean.yahoo";

const LIST_URL: &str = "https://api.bseindia.com/BseIndiaAPI/api/ListofScripData/w?Group=&Scripcode=&industry=&segment=Equity&status=Active";
const QUOTE_URL: &str = "https://api.bseindia.com/BseIndiaAPI/api/StockTrading/w?flag=&quotetype=EQ&scripcode=";
const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REFRESH_AFTER_DAYS: i64 = 2;

/// One company as the exchange lists it. Unknown fields are kept as-is.
pub type Company = Map<String, Value>;

/// Resolve an ISIN to the commodity name used in the ledger.
pub trait TickerLookup {
    fn isin_to_ticker(&self, isin: &str) -> Result<String>;
}

fn leading_digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d").expect("leading digit regex"))
}

/// Make an exchange ticker a valid commodity: `AR&M` -> `AR-AND-M`,
/// `20MICRONS` -> `N-20MICRONS`.
pub fn sanitize_ticker(ticker: &str) -> String {
    let mut out = if leading_digit_re().is_match(ticker) {
        format!("N-{ticker}")
    } else {
        ticker.to_string()
    };
    out = out.replace('&', "-AND-");
    out.retain(|c| c != ' ');
    out
}

fn field<'a>(company: &'a Company, key: &str) -> Option<&'a str> {
    company.get(key).and_then(Value::as_str)
}

/// Numbers arrive either as JSON numbers or as strings.
fn decimal_of(value: &Value) -> Result<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => bail!("expected a number, got {other}"),
    };
    text.parse::<Decimal>()
        .with_context(|| format!("invalid number {text:?}"))
}

#[derive(Debug, Clone, Default)]
pub struct BseSnapshot {
    companies: Vec<Company>,
    by_isin: HashMap<String, usize>,
}

impl BseSnapshot {
    pub fn from_companies(companies: Vec<Company>) -> Self {
        let by_isin = companies
            .iter()
            .enumerate()
            .filter_map(|(i, c)| field(c, ISIN_KEY).map(|isin| (isin.to_string(), i)))
            .collect();
        Self { companies, by_isin }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let value: Value =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(Self::from_companies(companies_of(value)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let json = serde_json::to_string(&self.companies)?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn company(&self, isin: &str) -> Option<&Company> {
        self.by_isin.get(isin).map(|&i| &self.companies[i])
    }

    /// `fresh` laid over `old` by ISIN: fresh entries win, nothing is dropped.
    pub fn merge(old: Vec<Company>, fresh: Vec<Company>) -> Self {
        let mut merged = Self::from_companies(old);
        for company in fresh {
            let Some(isin) = field(&company, ISIN_KEY).map(str::to_string) else {
                debug!("company without ISIN ignored");
                continue;
            };
            match merged.by_isin.get(&isin) {
                Some(&i) => merged.companies[i] = company,
                None => {
                    merged.by_isin.insert(isin, merged.companies.len());
                    merged.companies.push(company);
                }
            }
        }
        merged
    }

    pub fn scrip_code(&self, isin: &str) -> Result<String> {
        let company = self
            .company(isin)
            .ok_or_else(|| anyhow!("ISIN {isin} not found in BSE data"))?;
        match company.get(SCRIP_CODE_KEY) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => bail!("ISIN {isin} has no scrip code"),
        }
    }

    /// Exchange ticker whose sanitized form is `ticker`.
    pub fn unsanitize_ticker(&self, ticker: &str) -> Result<String> {
        self.companies
            .iter()
            .filter_map(|c| field(c, TICKER_KEY))
            .find(|t| sanitize_ticker(t) == ticker)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("ticker {ticker} not found in BSE data"))
    }

    pub fn ticker_to_isin(&self, ticker: &str) -> Result<String> {
        let raw = self.unsanitize_ticker(ticker)?;
        self.companies
            .iter()
            .find(|c| field(c, TICKER_KEY) == Some(raw.as_str()))
            .and_then(|c| field(c, ISIN_KEY))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("ticker {ticker} has no ISIN"))
    }

    /// `RELIANCE` -> `rupeebean.yahoo/RELIANCE.BO`
    pub fn ticker_to_price_source(&self, ticker: &str) -> Result<String> {
        let raw = self.unsanitize_ticker(ticker)?;
        Ok(format!("{PRICE_SOURCE}/{raw}.BO"))
    }

    /// A commodity declaration with its price source for every company.
    pub fn commodities(&self) -> Vec<Directive> {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        self.companies
            .iter()
            .filter_map(|c| field(c, TICKER_KEY))
            .map(|raw| {
                let mut meta = Meta::new();
                meta.insert("price", format!("{PRICE_SOURCE}/{raw}.BO"));
                Commodity {
                    date: epoch,
                    currency: sanitize_ticker(raw),
                    meta,
                }
                .into()
            })
            .collect()
    }

    pub fn export_commodity_declarations(&self) -> String {
        render_all(&self.commodities())
    }
}

impl TickerLookup for BseSnapshot {
    fn isin_to_ticker(&self, isin: &str) -> Result<String> {
        self.company(isin)
            .and_then(|c| field(c, TICKER_KEY))
            .map(sanitize_ticker)
            .ok_or_else(|| anyhow!("ISIN {isin} not found in BSE data"))
    }
}

fn companies_of(value: Value) -> Result<Vec<Company>> {
    let Value::Array(items) = value else {
        bail!("BSE data is not a list of companies; the API may have changed");
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => bail!("BSE company entry is not an object: {other}"),
        })
        .collect()
}

/// Snapshot missing, unreadable, or last written more than two days before `today`.
pub fn needs_refresh(path: &Path, today: NaiveDate) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return true;
    };
    let written = DateTime::<Local>::from(modified).date_naive();
    (today - written).num_days() > REFRESH_AFTER_DAYS
}

pub struct BseClient {
    http: reqwest::Client,
    snapshot: BseSnapshot,
}

fn http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static("https://www.bseindia.com/"));
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("build BSE http client")
}

impl BseClient {
    /// Load the snapshot at `path`, refreshing it from the exchange when stale.
    pub async fn open(path: &Path) -> Result<Self> {
        let http = http_client()?;
        let today = Local::now().date_naive();
        let snapshot = if needs_refresh(path, today) {
            info!(path = %path.display(), "refreshing BSE company list");
            let fresh = fetch_companies(&http).await?;
            let old = if path.exists() {
                BseSnapshot::load(path)?.companies
            } else {
                Vec::new()
            };
            let merged = BseSnapshot::merge(old, fresh);
            merged.save(path)?;
            merged
        } else {
            debug!(path = %path.display(), "using cached BSE company list");
            BseSnapshot::load(path)?
        };
        Ok(Self { http, snapshot })
    }

    /// Work from an existing snapshot without touching the cache file.
    pub fn with_snapshot(snapshot: BseSnapshot) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &BseSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> BseSnapshot {
        self.snapshot
    }

    /// Weighted average price of today's trades.
    pub async fn isin_to_price(&self, isin: &str) -> Result<Decimal> {
        let code = self.snapshot.scrip_code(isin)?;
        let resp = self
            .http
            .get(format!("{QUOTE_URL}{code}"))
            .send()
            .await
            .with_context(|| format!("fetch price for ISIN {isin}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("failed to fetch price for ISIN {isin}: status {status}");
        }
        let body: Value = resp.json().await.context("parse BSE quote")?;
        let wap = body
            .get(PRICE_KEY)
            .ok_or_else(|| anyhow!("BSE quote for {isin} has no `{PRICE_KEY}`"))?;
        decimal_of(wap)
    }

    pub async fn ticker_to_price(&self, ticker: &str) -> Result<Decimal> {
        let isin = self.snapshot.ticker_to_isin(ticker)?;
        self.isin_to_price(&isin).await
    }
}

impl TickerLookup for BseClient {
    fn isin_to_ticker(&self, isin: &str) -> Result<String> {
        self.snapshot.isin_to_ticker(isin)
    }
}

async fn fetch_companies(http: &reqwest::Client) -> Result<Vec<Company>> {
    let resp = http
        .get(LIST_URL)
        .send()
        .await
        .context("fetch BSE company list")?;
    let status = resp.status();
    if !status.is_success() {
        bail!("failed to fetch BSE data: status {status}");
    }
    let value: Value = resp.json().await.context("parse BSE company list")?;
    let companies = companies_of(value)?;
    info!(companies = companies.len(), "downloaded BSE company list");
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn company(isin: &str, ticker: &str, code: &str) -> Company {
        match json!({
            "ISIN_NUMBER": isin,
            "scrip_id": ticker,
            "SCRIP_CD": code,
            "Scrip_Name": format!("{ticker} Ltd"),
            "Status": "Active",
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn snapshot() -> BseSnapshot {
        BseSnapshot::from_companies(vec![
            company("INE002A01018", "RELIANCE", "500325"),
            company("INE0ABC01010", "AR&M", "540000"),
            company("INE144J01027", "20MICRONS", "533022"),
        ])
    }

    #[test]
    fn test_sanitize_ticker() {
        assert_eq!(sanitize_ticker("AR&M"), "AR-AND-M");
        assert_eq!(sanitize_ticker("20MICRONS"), "N-20MICRONS");
        assert_eq!(sanitize_ticker("M M FORGINGS"), "MMFORGINGS");
        assert_eq!(sanitize_ticker("RELIANCE"), "RELIANCE");
    }

    #[test]
    fn test_lookups() {
        let s = snapshot();
        assert_eq!(s.isin_to_ticker("INE0ABC01010").unwrap(), "AR-AND-M");
        assert_eq!(s.unsanitize_ticker("N-20MICRONS").unwrap(), "20MICRONS");
        assert_eq!(s.ticker_to_isin("AR-AND-M").unwrap(), "INE0ABC01010");
        assert_eq!(s.scrip_code("INE002A01018").unwrap(), "500325");
        assert_eq!(
            s.ticker_to_price_source("RELIANCE").unwrap(),
            "rupeebean.yahoo/RELIANCE.BO"
        );
        assert!(s.isin_to_ticker("INE999Z01010").is_err());
        assert!(s.unsanitize_ticker("NOPE").is_err());
    }

    #[test]
    fn test_merge_keeps_old_entries_and_prefers_fresh() {
        let old = vec![
            company("INE002A01018", "RELIANCE", "500325"),
            company("INE000DELIST", "GONE", "1"),
        ];
        let fresh = vec![
            company("INE002A01018", "RELIANCE", "999999"),
            company("INE0NEW01010", "NEWCO", "2"),
        ];
        let merged = BseSnapshot::merge(old, fresh);
        assert_eq!(merged.companies().len(), 3);
        assert_eq!(merged.scrip_code("INE002A01018").unwrap(), "999999");
        assert!(merged.company("INE000DELIST").is_some());
        assert_eq!(field(&merged.companies()[2], TICKER_KEY), Some("NEWCO"));
    }

    #[test]
    fn test_save_and_load_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("bse.json");
        snapshot().save(&path).unwrap();
        let loaded = BseSnapshot::load(&path).unwrap();
        assert_eq!(loaded.companies().len(), 3);
        let reliance = loaded.company("INE002A01018").unwrap();
        assert_eq!(field(reliance, "Scrip_Name"), Some("RELIANCE Ltd"));
    }

    #[test]
    fn test_non_list_snapshot_is_an_error() {
        assert!(companies_of(json!({"error": "blocked"})).is_err());
        assert!(companies_of(json!([1, 2])).is_err());
    }

    #[test]
    fn test_needs_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bse.json");
        let today = Local::now().date_naive();
        assert!(needs_refresh(&path, today));
        fs::write(&path, "[]").unwrap();
        assert!(!needs_refresh(&path, today));
        assert!(!needs_refresh(&path, today + chrono::Duration::days(2)));
        assert!(needs_refresh(&path, today + chrono::Duration::days(3)));
    }

    #[test]
    fn test_commodity_declarations() {
        let out = snapshot().export_commodity_declarations();
        assert!(out.starts_with("2000-01-01 commodity RELIANCE\n  price: \"rupeebean.yahoo/RELIANCE.BO\"\n"));
        assert!(out.contains("2000-01-01 commodity AR-AND-M\n  price: \"rupeebean.yahoo/AR&M.BO\"\n"));
        assert!(out.contains("commodity N-20MICRONS"));
    }

    #[test]
    fn test_decimal_of_string_or_number() {
        assert_eq!(decimal_of(&json!("2501.35")).unwrap(), "2501.35".parse::<Decimal>().unwrap());
        assert_eq!(decimal_of(&json!(120.5)).unwrap(), "120.5".parse::<Decimal>().unwrap());
        assert!(decimal_of(&json!(null)).is_err());
    }
}
