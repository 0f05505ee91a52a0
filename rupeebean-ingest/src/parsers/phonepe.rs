//! PhonePe payment confirmation e-mails saved as HTML.
//!
//! Each mail is one transaction. The bank account is recognised from the
//! masked number printed in the mail.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use rupeebean_core::ledger::{Amount, Directive, Posting, Source, Transaction};
use rupeebean_core::parse::{parse_amount, parse_date, DateOrder};

use crate::html::strip_tags;
use crate::importer::{strip_date_prefix, Importer};
use crate::parsers::source_of;
use crate::source::SourceFile;

pub struct PhonePeImporter {
    /// Masked number exactly as printed in the mail, to ledger account.
    accounts: BTreeMap<String, String>,
    add_payee: bool,
}

impl PhonePeImporter {
    pub fn new(accounts: BTreeMap<String, String>) -> Self {
        Self {
            accounts,
            add_payee: true,
        }
    }

    pub fn with_payee(mut self, add_payee: bool) -> Self {
        self.add_payee = add_payee;
        self
    }

    fn transaction(&self, file: &SourceFile) -> Result<Transaction> {
        parse_transaction(
            file.text()?,
            &self.accounts,
            self.add_payee,
            &source_of(file),
            &file.name(),
        )
        .with_context(|| format!("phonepe mail {}", file.name()))
    }
}

macro_rules! static_re {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(concat!("phonepe ", stringify!($name))))
        }
    };
}

// Payee and message are words separated by at most two spaces.
static_re!(payee_re, r"(?:Paid to|Received from)\s*((?:\w+ {1,2})*)");
static_re!(message_re, r"Message\s*:\s*((?:\w+ {1,2})*)");
static_re!(account_re, r"\w+XXXX+\d+");
static_re!(txn_id_re, r"Txn\. ID\s*:\s*(\w+)");
static_re!(status_re, r"Txn\. status\s*:\s*(\w*)");
static_re!(bank_ref_re, r"Bank Ref\. No\.\s*: \s*(\w*)");
static_re!(amount_re, r"₹ *((?:\d+,)*\d+(?:\.\d{2})?)");
static_re!(date_re, r"(\w+) (\d+), (\d{4})");

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn mail_date(text: &str) -> Result<Option<NaiveDate>> {
    let Some(c) = date_re().captures(text) else {
        return Ok(None);
    };
    let spelled = format!("{} {}, {}", &c[1], &c[2], &c[3]);
    match parse_date(&spelled, DateOrder::DayFirst) {
        Some(date) => Ok(Some(date)),
        None => bail!("could not parse the month from the date {:?}", &c[1]),
    }
}

/// Build the single transaction a PhonePe mail describes.
pub fn parse_transaction(
    html: &str,
    accounts: &BTreeMap<String, String>,
    add_payee: bool,
    source: &Source,
    document: &str,
) -> Result<Transaction> {
    let text = strip_tags(html);
    let sign = if text.contains("Debited from") {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ONE
    };

    let date = mail_date(&text)?;
    let amount = match capture(amount_re(), &text) {
        Some(raw) => Some(sign * parse_amount(raw)?),
        None => None,
    };
    let account = match account_re().find(&text) {
        Some(m) => match accounts.get(m.as_str()) {
            Some(account) => Some(account.clone()),
            None => bail!(
                "account {:?} not in the accounts map; known: {:?}",
                m.as_str(),
                accounts.keys().collect::<Vec<_>>()
            ),
        },
        None => None,
    };
    let (Some(date), Some(amount), Some(account)) = (date, amount, account) else {
        bail!("could not find date, amount and account (date {date:?}, amount {amount:?})");
    };

    let status = capture(status_re(), &text).unwrap_or_default();
    if !status.eq_ignore_ascii_case("successful") {
        bail!("transaction status is {status:?}, not successful");
    }

    let narration = capture(message_re(), &text)
        .filter(|m| !m.is_empty())
        .unwrap_or("unknown transaction");
    let payee = capture(payee_re(), &text)
        .filter(|_| add_payee)
        .map(str::to_string);
    let bank_ref = capture(bank_ref_re(), &text)
        .filter(|r| !r.is_empty())
        .unwrap_or("-");

    let mut posting = Posting::new(account, Amount::inr(amount))
        .with_meta("document", document)
        .with_meta("transaction_ref", bank_ref);
    if let Some(id) = capture(txn_id_re(), &text) {
        posting = posting.with_meta("phonepe_txn_id", id);
    }
    Ok(Transaction::new(source.clone(), date, narration)
        .with_payee(payee)
        .with_tag("phonepe")
        .with_posting(posting))
}

impl Importer for PhonePeImporter {
    fn name(&self) -> &str {
        "phonepe"
    }

    fn identify(&self, file: &SourceFile) -> bool {
        file.mime_type() == Some("text/html") && self.transaction(file).is_ok()
    }

    fn extract(&self, file: &SourceFile) -> Result<Vec<Directive>> {
        Ok(vec![self.transaction(file)?.into()])
    }

    fn file_account(&self, file: &SourceFile) -> Result<String> {
        let txn = self.transaction(file)?;
        match txn.postings.into_iter().next() {
            Some(posting) => Ok(posting.account),
            None => bail!("phonepe transaction without a posting"),
        }
    }

    fn file_date(&self, file: &SourceFile) -> Result<Option<NaiveDate>> {
        Ok(Some(self.transaction(file)?.date))
    }

    fn file_name(&self, file: &SourceFile) -> Result<Option<String>> {
        Ok(Some(strip_date_prefix(&file.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testing::{d, dec};

    const MAIL: &str = "<html><body>\
        <p>Paid to</p>\n<p>Cafe Coffee Day </p>\n\
        <p>&#8377; 1,250.50</p>\n\
        <p>Txn. ID : T2401051234</p>\n\
        <p>Txn. status : Successful</p>\n\
        <p>Jan 05, 2024 </p>\n\
        <p>Debited from</p>\n<p>XXXXXXXXXX56</p>\n\
        <p>Bank Ref. No. : 409912345678</p>\n\
        <p>Message : lunch with team </p>\n\
        </body></html>";

    fn accounts() -> BTreeMap<String, String> {
        BTreeMap::from([("XXXXXXXXXX56".to_string(), "Assets:Savings:Canara".to_string())])
    }

    fn parse(html: &str, add_payee: bool) -> Result<Transaction> {
        parse_transaction(html, &accounts(), add_payee, &Source::new("mail.html", 0), "mail.html")
    }

    #[test]
    fn test_debit_mail() {
        let txn = parse(MAIL, true).unwrap();
        assert_eq!(txn.date, d(2024, 1, 5));
        assert_eq!(txn.narration, "lunch with team");
        assert_eq!(txn.payee.as_deref(), Some("Cafe Coffee Day"));
        assert!(txn.tags.contains("phonepe"));
        let posting = &txn.postings[0];
        assert_eq!(posting.account, "Assets:Savings:Canara");
        assert_eq!(posting.units.as_ref().map(|a| a.number), Some(dec("-1250.50")));
        let keys: Vec<_> = posting.meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["document", "transaction_ref", "phonepe_txn_id"]);
        assert_eq!(posting.meta.get("transaction_ref"), Some("409912345678"));
        assert_eq!(posting.meta.get("phonepe_txn_id"), Some("T2401051234"));
    }

    #[test]
    fn test_payee_can_be_left_out() {
        assert_eq!(parse(MAIL, false).unwrap().payee, None);
    }

    #[test]
    fn test_credit_without_message_or_bank_ref() {
        let html = MAIL
            .replace("Debited from", "Credited to")
            .replace("Paid to", "Received from")
            .replace("<p>Message : lunch with team </p>", "")
            .replace("Bank Ref. No. : 409912345678", "");
        let txn = parse(&html, true).unwrap();
        assert_eq!(txn.postings[0].units.as_ref().map(|a| a.number), Some(dec("1250.50")));
        assert_eq!(txn.narration, "unknown transaction");
        assert_eq!(txn.postings[0].meta.get("transaction_ref"), Some("-"));
    }

    #[test]
    fn test_unknown_account_and_failed_status_are_errors() {
        let unknown = MAIL.replace("XXXXXXXXXX56", "XXXXXX9927");
        assert!(parse(&unknown, true).unwrap_err().to_string().contains("XXXXXX9927"));
        let failed = MAIL.replace("Successful", "Failed");
        assert!(parse(&failed, true).is_err());
    }

    #[test]
    fn test_importer_on_saved_mail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-01-05.phonepe.html");
        std::fs::write(&path, MAIL).unwrap();
        let file = SourceFile::new(path.clone());
        let imp = PhonePeImporter::new(accounts());
        assert!(imp.identify(&file));
        assert_eq!(imp.file_account(&file).unwrap(), "Assets:Savings:Canara");
        assert_eq!(imp.file_date(&file).unwrap(), Some(d(2024, 1, 5)));
        assert_eq!(imp.file_name(&file).unwrap().as_deref(), Some("phonepe.html"));
        assert_eq!(imp.extract(&file).unwrap().len(), 1);

        let txt = dir.path().join("mail.txt");
        std::fs::write(&txt, MAIL).unwrap();
        assert!(!imp.identify(&SourceFile::new(txt)));
    }
}
