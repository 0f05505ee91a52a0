//! Ledger directive types emitted by importers.
//!
//! These mirror the subset of beancount the importers produce: transactions
//! with simple postings, balance assertions, commodity declarations and
//! prices. Rendering lives in [`crate::render`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency used by every bank importer.
pub const INR: &str = "INR";

/// Ordered key/value metadata attached to directives and postings.
///
/// Insertion order is kept so rendered output matches the order in which
/// importers add keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta(Vec<(String, String)>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Where a directive came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub filename: String,
    pub lineno: usize,
}

impl Source {
    pub fn new(filename: impl Into<String>, lineno: usize) -> Self {
        Self {
            filename: filename.into(),
            lineno,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

impl Amount {
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }

    pub fn inr(number: Decimal) -> Self {
        Self::new(number, INR)
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.number, self.currency.clone())
    }
}

/// Cost basis of a posting. All fields empty means "let booking decide".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSpec {
    pub number_per: Option<Decimal>,
    pub currency: Option<String>,
    pub date: Option<NaiveDate>,
}

impl CostSpec {
    /// `{}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn per_unit(number: Decimal, currency: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            number_per: Some(number),
            currency: Some(currency.into()),
            date: Some(date),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number_per.is_none() && self.currency.is_none() && self.date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    /// `None` leaves the posting for the ledger to balance.
    pub units: Option<Amount>,
    pub cost: Option<CostSpec>,
    pub price: Option<Amount>,
    pub meta: Meta,
}

impl Posting {
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Self {
            account: account.into(),
            units: Some(units),
            cost: None,
            price: None,
            meta: Meta::new(),
        }
    }

    /// A posting without units.
    pub fn auto(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            units: None,
            cost: None,
            price: None,
            meta: Meta::new(),
        }
    }

    pub fn with_cost(mut self, cost: CostSpec) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_price(mut self, price: Amount) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Okay,
    Warning,
}

impl Flag {
    pub fn as_char(&self) -> char {
        match self {
            Flag::Okay => '*',
            Flag::Warning => '!',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: Source,
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub meta: Meta,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn new(source: Source, date: NaiveDate, narration: impl Into<String>) -> Self {
        Self {
            source,
            date,
            flag: Flag::Okay,
            payee: None,
            narration: narration.into(),
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            meta: Meta::new(),
            postings: Vec::new(),
        }
    }

    pub fn with_payee(mut self, payee: Option<String>) -> Self {
        self.payee = payee;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.insert(link.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }

    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }
}

/// Balance assertion, checked by the ledger at the start of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub source: Source,
    pub date: NaiveDate,
    pub account: String,
    pub amount: Amount,
    pub meta: Meta,
}

impl Balance {
    pub fn new(source: Source, date: NaiveDate, account: impl Into<String>, amount: Amount) -> Self {
        Self {
            source,
            date,
            account: account.into(),
            amount,
            meta: Meta::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub date: NaiveDate,
    pub currency: String,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub date: NaiveDate,
    pub currency: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    Transaction(Transaction),
    Balance(Balance),
    Commodity(Commodity),
    Price(Price),
}

impl Directive {
    pub fn date(&self) -> NaiveDate {
        match self {
            Directive::Transaction(t) => t.date,
            Directive::Balance(b) => b.date,
            Directive::Commodity(c) => c.date,
            Directive::Price(p) => p.date,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Directive::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Transaction> for Directive {
    fn from(t: Transaction) -> Self {
        Directive::Transaction(t)
    }
}

impl From<Balance> for Directive {
    fn from(b: Balance) -> Self {
        Directive::Balance(b)
    }
}

impl From<Commodity> for Directive {
    fn from(c: Commodity) -> Self {
        Directive::Commodity(c)
    }
}

impl From<Price> for Directive {
    fn from(p: Price) -> Self {
        Directive::Price(p)
    }
}

/// Stable sort by date; equal dates keep their extraction order.
pub fn sort_directives(directives: &mut [Directive]) {
    directives.sort_by_key(|d| d.date());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_meta_keeps_insertion_order_and_replaces() {
        let mut meta = Meta::new();
        meta.insert("document", "a.pdf");
        meta.insert("transaction_ref", "123");
        meta.insert("document", "b.pdf");
        let keys: Vec<_> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["document", "transaction_ref"]);
        assert_eq!(meta.get("document"), Some("b.pdf"));
    }

    #[test]
    fn test_cost_spec_empty() {
        assert!(CostSpec::empty().is_empty());
        assert!(!CostSpec::per_unit(dec("10.5"), INR, d(2024, 1, 2)).is_empty());
    }

    #[test]
    fn test_sort_directives_is_stable() {
        let src = Source::new("x", 0);
        let mut ds: Vec<Directive> = vec![
            Transaction::new(src.clone(), d(2024, 3, 1), "late").into(),
            Transaction::new(src.clone(), d(2024, 1, 1), "first").into(),
            Transaction::new(src.clone(), d(2024, 1, 1), "second").into(),
        ];
        sort_directives(&mut ds);
        let names: Vec<_> = ds
            .iter()
            .filter_map(|d| d.as_transaction())
            .map(|t| t.narration.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "late"]);
    }

    #[test]
    fn test_amount_negated() {
        let a = Amount::inr(dec("-250.00"));
        assert_eq!(a.negated().number, dec("250.00"));
        assert_eq!(a.negated().currency, "INR");
    }

    #[test]
    fn test_amounts_serialize_as_exact_strings() {
        let json = serde_json::to_value(Amount::inr(dec("1250.50"))).unwrap();
        assert_eq!(json, serde_json::json!({"number": "1250.50", "currency": "INR"}));
        let back: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(back.number.to_string(), "1250.50");
    }
}
