//! Daily prices from Yahoo Finance, quantized to paise.
//!
//! BSE closes come back from Yahoo as binary floats (`120.099999234`); the
//! ledger wants `120.10`.

use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use rupeebean_core::ledger::{Amount, Price};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Which series of the chart to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceType {
    AdjClose,
    Close,
    Open,
    High,
    Low,
    /// Halfway between the day's high and low.
    Mid,
}

impl PriceType {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "" | "adjclose" => PriceType::AdjClose,
            "close" => PriceType::Close,
            "open" => PriceType::Open,
            "high" => PriceType::High,
            "low" => PriceType::Low,
            "mid" => PriceType::Mid,
            other => bail!("unknown price type {other:?}"),
        })
    }
}

/// `base:quote:type`, each part possibly carrying `_XX` hex escapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub base: String,
    pub quote: Option<String>,
    pub price_type: PriceType,
}

fn escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_[0-9a-fA-F]{2}").expect("ticker escape regex"))
}

fn unescape(part: &str) -> String {
    escape_re()
        .replace_all(part, |c: &regex::Captures| {
            u8::from_str_radix(&c[0][1..], 16)
                .map(|b| char::from(b).to_string())
                .unwrap_or_else(|_| c[0].to_string())
        })
        .into_owned()
}

pub fn decode_ticker(ticker: &str) -> Result<Ticker> {
    let mut parts = ticker.split(':').map(unescape);
    let base = parts.next().unwrap_or_default();
    if base.is_empty() {
        bail!("empty ticker");
    }
    let quote = parts.next().filter(|q| !q.is_empty());
    let price_type = PriceType::parse(&parts.next().unwrap_or_default())?;
    Ok(Ticker {
        base,
        quote,
        price_type,
    })
}

/// Round half to even at two places, always printing two decimals.
pub fn quantize(value: Decimal) -> Decimal {
    let mut out = value.round_dp(2);
    out.rescale(2);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePrice {
    pub date: NaiveDate,
    pub price: Decimal,
    pub currency: Option<String>,
}

impl SourcePrice {
    /// `DATE price COMMODITY PRICE CUR`; `INR` when the chart names no currency.
    pub fn to_price(&self, commodity: &str) -> Price {
        let currency = self.currency.clone().unwrap_or_else(|| "INR".to_string());
        Price {
            date: self.date,
            currency: commodity.to_string(),
            amount: Amount::new(self.price, currency),
        }
    }
}

fn number(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn series<'a>(quote: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    quote.get(key).and_then(Value::as_array)
}

/// Prices out of a chart response, skipping days without a value.
pub fn parse_chart(data: &Value, price_type: PriceType, quote: Option<&str>) -> Result<Vec<SourcePrice>> {
    if let Some(error) = data.pointer("/chart/error").filter(|e| !e.is_null()) {
        let desc = error
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        bail!("Yahoo API error: {desc}");
    }
    let chart = data
        .pointer("/chart/result/0")
        .ok_or_else(|| anyhow!("invalid chart response"))?;
    let currency = quote
        .map(str::to_string)
        .or_else(|| chart.pointer("/meta/currency").and_then(Value::as_str).map(str::to_string));
    let Some(timestamps) = chart.get("timestamp").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let bars = chart
        .pointer("/indicators/quote/0")
        .ok_or_else(|| anyhow!("chart without quote data"))?;
    let adjclose = chart
        .pointer("/indicators/adjclose/0/adjclose")
        .and_then(Value::as_array);

    let pick = |key: &str, i: usize| series(bars, key).and_then(|s| s.get(i)).and_then(number);
    let mut out = Vec::new();
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(date) = ts
            .as_i64()
            .and_then(|t| DateTime::from_timestamp(t, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        let value = match price_type {
            PriceType::AdjClose => adjclose
                .and_then(|s| s.get(i))
                .and_then(number)
                .or_else(|| pick("close", i)),
            PriceType::Close => pick("close", i),
            PriceType::Open => pick("open", i),
            PriceType::High => pick("high", i),
            PriceType::Low => pick("low", i),
            PriceType::Mid => match (pick("high", i), pick("low", i)) {
                (Some(h), Some(l)) => Some((h + l) / Decimal::from(2)),
                _ => None,
            },
        };
        if let Some(price) = value {
            out.push(SourcePrice {
                date,
                price: quantize(price),
                currency: currency.clone(),
            });
        }
    }
    Ok(out)
}

pub struct YahooSource {
    http: reqwest::Client,
}

impl YahooSource {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("build Yahoo http client")?;
        Ok(Self { http })
    }

    /// Daily prices for `ticker` between `begin` and `end`, inclusive.
    pub async fn prices_series(&self, ticker: &str, begin: NaiveDate, end: NaiveDate) -> Result<Vec<SourcePrice>> {
        let decoded = decode_ticker(ticker)?;
        let from = begin.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let to = end.and_hms_opt(23, 59, 59).map(|t| t.and_utc().timestamp()).unwrap_or(0);

        let mut url = reqwest::Url::parse(BASE_URL)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("chart url cannot take a path"))?
            .push(&decoded.base);
        url.query_pairs_mut()
            .append_pair("period1", &from.to_string())
            .append_pair("period2", &to.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "capitalGain|div|split");
        debug!(%url, "fetching Yahoo chart");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("request chart for {}", decoded.base))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Yahoo returned {status} for {}: {body}", decoded.base);
        }
        let data: Value = resp.json().await.context("parse Yahoo chart")?;
        parse_chart(&data, decoded.price_type, decoded.quote.as_deref())
    }

    /// Most recent price within the week before `today`.
    pub async fn latest_price(&self, ticker: &str, today: NaiveDate) -> Result<Option<SourcePrice>> {
        let prices = self.prices_series(ticker, today - Duration::days(7), today).await?;
        Ok(prices.into_iter().last())
    }

    pub async fn historical_price(&self, ticker: &str, date: NaiveDate) -> Result<Option<SourcePrice>> {
        let prices = self.prices_series(ticker, date, date).await?;
        Ok(prices.into_iter().last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_decode_ticker() {
        let t = decode_ticker("RELIANCE.BO").unwrap();
        assert_eq!(t.base, "RELIANCE.BO");
        assert_eq!(t.quote, None);
        assert_eq!(t.price_type, PriceType::AdjClose);

        let t = decode_ticker("_5ENSEI:INR:close").unwrap();
        assert_eq!(t.base, "^NSEI");
        assert_eq!(t.quote.as_deref(), Some("INR"));
        assert_eq!(t.price_type, PriceType::Close);

        assert!(decode_ticker("X.BO::weekly").is_err());
        assert!(decode_ticker("").is_err());
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(dec("120.099999234")).to_string(), "120.10");
        assert_eq!(quantize(dec("7")).to_string(), "7.00");
        assert_eq!(quantize(dec("2.125")).to_string(), "2.12");
    }

    fn chart() -> Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {"currency": "INR", "symbol": "RELIANCE.BO"},
                    "timestamp": [1704253500, 1704339900, 1704426300],
                    "indicators": {
                        "quote": [{
                            "close": [2585.050048828125, null, 2601.899902],
                            "open": [2570.0, 2590.0, 2595.0],
                            "high": [2600.0, 2610.0, 2620.0],
                            "low": [2560.0, 2575.0, 2590.0]
                        }],
                        "adjclose": [{"adjclose": [2580.33, null, 2597.1]}]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_chart_closes() {
        let prices = parse_chart(&chart(), PriceType::Close, None).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(prices[0].price, dec("2585.05"));
        assert_eq!(prices[1].price, dec("2601.90"));
        assert_eq!(prices[1].currency.as_deref(), Some("INR"));
    }

    #[test]
    fn test_parse_chart_other_types() {
        let adj = parse_chart(&chart(), PriceType::AdjClose, Some("USD")).unwrap();
        assert_eq!(adj[0].price, dec("2580.33"));
        assert_eq!(adj[0].currency.as_deref(), Some("USD"));
        let mid = parse_chart(&chart(), PriceType::Mid, None).unwrap();
        assert_eq!(mid.len(), 3);
        assert_eq!(mid[1].price, dec("2592.50"));
    }

    #[test]
    fn test_parse_chart_error() {
        let data = json!({"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}});
        let err = parse_chart(&data, PriceType::Close, None).unwrap_err();
        assert!(err.to_string().contains("No data found"));
    }

    #[test]
    fn test_price_directive() {
        let p = SourcePrice {
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            price: dec("2585.05"),
            currency: None,
        };
        let directive = rupeebean_core::ledger::Directive::from(p.to_price("RELIANCE"));
        assert_eq!(
            rupeebean_core::render::render(&directive),
            "2024-01-03 price RELIANCE  2585.05 INR\n"
        );
    }
}
