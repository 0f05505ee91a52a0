use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rupeebean_core::ledger::{Amount, Meta, Posting, Source, Transaction};

/// Normalized output of statement parsers (bank-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub date: NaiveDate,
    pub narration: String,
    /// Signed from the account holder's side: credits positive.
    pub amount: Decimal,
    /// Running balance when the statement prints one.
    pub balance: Option<Decimal>,
    /// Bank reference or cheque number, kept as `transaction_ref` meta.
    pub reference: Option<String>,
    /// Extra posting metadata, in insertion order.
    pub meta: Meta,
}

impl StatementRow {
    pub fn new(date: NaiveDate, narration: impl Into<String>, amount: Decimal) -> Self {
        Self {
            date,
            narration: narration.into(),
            amount,
            balance: None,
            reference: None,
            meta: Meta::new(),
        }
    }

    pub fn with_balance(mut self, balance: Option<Decimal>) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        let r = reference.into();
        self.reference = (!r.trim().is_empty()).then(|| r.trim().to_string());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }

    /// Single-posting INR transaction against `account`.
    ///
    /// `document` names the statement file in posting metadata when given.
    pub fn into_transaction(
        self,
        account: &str,
        source: &Source,
        index: usize,
        document: Option<&str>,
    ) -> Transaction {
        let mut posting = Posting::new(account, Amount::inr(self.amount));
        if let Some(doc) = document {
            posting.meta.insert("document", doc);
        }
        if let Some(reference) = self.reference {
            posting.meta.insert("transaction_ref", reference);
        }
        for (k, v) in self.meta.iter() {
            posting.meta.insert(k, v);
        }
        Transaction::new(
            Source::new(source.filename.clone(), index),
            self.date,
            self.narration,
        )
        .with_posting(posting)
    }
}
