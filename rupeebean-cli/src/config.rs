use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use rupeebean_core::parse::DateOrder;
use rupeebean_finance::bse::BseClient;
use rupeebean_finance::groww::GrowwImporter;
use rupeebean_ingest::csv_importer::{CsvColumns, CsvImporter};
use rupeebean_ingest::importer::Importer;
use rupeebean_ingest::parsers::{
    axis_credit_card::AxisCreditCardImporter, boi::BoiImporter,
    canara_savings::CanaraSavingsImporter, hdfc_credit_card::HdfcCreditCardImporter,
    hdfc_savings::HdfcSavingsImporter, hsbc, icici_credit_card_csv,
    icici_credit_card_email::IciciCreditCardEmailImporter,
    icici_credit_card_xls::IciciCreditCardXlsImporter,
    icici_savings_csv::IciciSavingsCsvImporter, icici_savings_email::IciciSavingsEmailImporter,
    icici_savings_xls::IciciSavingsXlsImporter, paytm::PaytmImporter,
    phonepe::PhonePeImporter, sbi::SbiImporter, sbi_email::SbiEmailImporter,
};

use crate::state;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "importer")]
    pub importers: Vec<ImporterConfig>,
}

fn yes() -> bool {
    true
}

/// One configured account. `kind` selects the statement format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImporterConfig {
    Sbi {
        account_number: String,
        account: String,
    },
    SbiEmail {
        account_number: String,
        name: String,
        password: String,
        account: String,
    },
    HdfcSavings {
        account_number: String,
        name: String,
        password: String,
        account: String,
    },
    HdfcCreditCard {
        grep: Vec<String>,
        password: String,
        account: String,
    },
    Hsbc {
        account: String,
    },
    Paytm {
        account_number: String,
        account: String,
    },
    IciciCreditCardXls {
        last_four: String,
        account: String,
    },
    IciciCreditCardCsv {
        last_four: String,
        account: String,
        #[serde(default = "yes")]
        invert_sign: bool,
    },
    IciciCreditCardEmail {
        grep: Vec<String>,
        password: String,
        account: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        card_holders: Vec<String>,
    },
    IciciSavingsCsv {
        account_number: String,
        account: String,
    },
    IciciSavingsXls {
        account_number: String,
        account: String,
    },
    IciciSavingsEmail {
        account_number: String,
        name: String,
        password: String,
        account: String,
    },
    AxisCreditCard {
        name: String,
        password: String,
        last_four: String,
        account: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cashback_account: Option<String>,
    },
    CanaraSavings {
        account_number: String,
        name: String,
        password: String,
        account: String,
    },
    Boi {
        account_number: String,
        account: String,
    },
    Phonepe {
        /// Masked number as printed in the mail, to ledger account.
        accounts: BTreeMap<String, String>,
        #[serde(default = "yes")]
        add_payee: bool,
    },
    Groww {
        grep: Vec<String>,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wallet: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        holding_account: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brokerage_account: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capital_gains_account: Option<String>,
    },
    /// Generic CSV statement; column numbers are zero-based.
    Csv {
        name: String,
        account: String,
        /// Regex that must match a line of the file.
        content: String,
        date: usize,
        narration: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debit: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credit: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drcr: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        balance: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<usize>,
        #[serde(default)]
        skip_lines: usize,
        #[serde(default)]
        month_first: bool,
        #[serde(default)]
        invert_sign: bool,
    },
}

impl ImporterConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ImporterConfig::Sbi { .. } => "sbi",
            ImporterConfig::SbiEmail { .. } => "sbi_email",
            ImporterConfig::HdfcSavings { .. } => "hdfc_savings",
            ImporterConfig::HdfcCreditCard { .. } => "hdfc_credit_card",
            ImporterConfig::Hsbc { .. } => "hsbc",
            ImporterConfig::Paytm { .. } => "paytm",
            ImporterConfig::IciciCreditCardXls { .. } => "icici_credit_card_xls",
            ImporterConfig::IciciCreditCardCsv { .. } => "icici_credit_card_csv",
            ImporterConfig::IciciCreditCardEmail { .. } => "icici_credit_card_email",
            ImporterConfig::IciciSavingsCsv { .. } => "icici_savings_csv",
            ImporterConfig::IciciSavingsXls { .. } => "icici_savings_xls",
            ImporterConfig::IciciSavingsEmail { .. } => "icici_savings_email",
            ImporterConfig::AxisCreditCard { .. } => "axis_credit_card",
            ImporterConfig::CanaraSavings { .. } => "canara_savings",
            ImporterConfig::Boi { .. } => "boi",
            ImporterConfig::Phonepe { .. } => "phonepe",
            ImporterConfig::Groww { .. } => "groww",
            ImporterConfig::Csv { .. } => "csv",
        }
    }

    /// Build the importer; Groww notes resolve ISINs through the cached
    /// BSE company list.
    pub async fn build(&self) -> Result<Box<dyn Importer>> {
        let importer: Box<dyn Importer> = match self.clone() {
            ImporterConfig::Sbi { account_number, account } => {
                Box::new(SbiImporter::new(account_number, account))
            }
            ImporterConfig::SbiEmail { account_number, name, password, account } => {
                Box::new(SbiEmailImporter::new(account_number, name, password, account))
            }
            ImporterConfig::HdfcSavings { account_number, name, password, account } => {
                Box::new(HdfcSavingsImporter::new(account_number, name, password, account))
            }
            ImporterConfig::HdfcCreditCard { grep, password, account } => {
                Box::new(HdfcCreditCardImporter::new(grep, password, account)?)
            }
            ImporterConfig::Hsbc { account } => Box::new(hsbc::importer(&account)?),
            ImporterConfig::Paytm { account_number, account } => {
                Box::new(PaytmImporter::new(account_number, account))
            }
            ImporterConfig::IciciCreditCardXls { last_four, account } => {
                Box::new(IciciCreditCardXlsImporter::new(last_four, account))
            }
            ImporterConfig::IciciCreditCardCsv { last_four, account, invert_sign } => {
                Box::new(icici_credit_card_csv::importer(&last_four, &account, invert_sign)?)
            }
            ImporterConfig::IciciCreditCardEmail { grep, password, account, card_holders } => {
                Box::new(
                    IciciCreditCardEmailImporter::new(grep, password, account)?
                        .with_card_holders(card_holders),
                )
            }
            ImporterConfig::IciciSavingsCsv { account_number, account } => {
                Box::new(IciciSavingsCsvImporter::new(account_number, account))
            }
            ImporterConfig::IciciSavingsXls { account_number, account } => {
                Box::new(IciciSavingsXlsImporter::new(account_number, account))
            }
            ImporterConfig::IciciSavingsEmail { account_number, name, password, account } => {
                Box::new(IciciSavingsEmailImporter::new(account_number, name, password, account))
            }
            ImporterConfig::AxisCreditCard { name, password, last_four, account, cashback_account } => {
                let mut importer = AxisCreditCardImporter::new(name, password, last_four, account);
                if let Some(cashback) = cashback_account {
                    importer = importer.with_cashback_account(cashback);
                }
                Box::new(importer)
            }
            ImporterConfig::CanaraSavings { account_number, name, password, account } => {
                Box::new(CanaraSavingsImporter::new(account_number, name, password, account))
            }
            ImporterConfig::Boi { account_number, account } => {
                Box::new(BoiImporter::new(account_number, account))
            }
            ImporterConfig::Phonepe { accounts, add_payee } => {
                Box::new(PhonePeImporter::new(accounts).with_payee(add_payee))
            }
            ImporterConfig::Groww {
                grep,
                password,
                wallet,
                holding_account,
                brokerage_account,
                capital_gains_account,
            } => {
                let bse = BseClient::open(&state::bse_path()?).await?;
                let mut importer = GrowwImporter::new(grep, password, Box::new(bse));
                if let Some(a) = wallet {
                    importer = importer.with_wallet(a);
                }
                if let Some(a) = holding_account {
                    importer = importer.with_holding_account(a);
                }
                if let Some(a) = brokerage_account {
                    importer = importer.with_brokerage_account(a);
                }
                if let Some(a) = capital_gains_account {
                    importer = importer.with_capital_gains_account(a);
                }
                Box::new(importer)
            }
            ImporterConfig::Csv {
                name,
                account,
                content,
                date,
                narration,
                amount,
                debit,
                credit,
                drcr,
                balance,
                reference,
                skip_lines,
                month_first,
                invert_sign,
            } => {
                let columns = CsvColumns {
                    date,
                    narration,
                    amount,
                    debit,
                    credit,
                    drcr,
                    balance,
                    reference,
                };
                let order = if month_first {
                    DateOrder::MonthFirst
                } else {
                    DateOrder::DayFirst
                };
                Box::new(
                    CsvImporter::new(name, account, columns, &content)?
                        .with_skip_lines(skip_lines)
                        .with_date_order(order)
                        .with_invert_sign(invert_sign),
                )
            }
        };
        Ok(importer)
    }
}

/// Build every configured importer, in configuration order.
pub async fn build_importers(cfg: &Config) -> Result<Vec<Box<dyn Importer>>> {
    let mut out = Vec::with_capacity(cfg.importers.len());
    for (i, entry) in cfg.importers.iter().enumerate() {
        let importer = entry
            .build()
            .await
            .with_context(|| format!("importer #{} ({})", i + 1, entry.kind()))?;
        debug!(kind = entry.kind(), "importer configured");
        out.push(importer);
    }
    Ok(out)
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p.to_path_buf()),
        None => state::default_config_path(),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, no importers configured");
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// A starting point for `config init`.
pub fn example_config() -> Config {
    Config {
        importers: vec![
            ImporterConfig::HdfcSavings {
                account_number: "50100123456789".to_string(),
                name: "JOHN DOE".to_string(),
                password: "hdfc-statement-password".to_string(),
                account: "Assets:Savings:HDFC".to_string(),
            },
            ImporterConfig::IciciCreditCardCsv {
                last_four: "1234".to_string(),
                account: "Liabilities:CreditCard:ICICI".to_string(),
                invert_sign: true,
            },
            ImporterConfig::Phonepe {
                accounts: BTreeMap::from([(
                    "XXXXXXXXXX89".to_string(),
                    "Assets:Savings:HDFC".to_string(),
                )]),
                add_payee: true,
            },
        ],
    }
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    save_config(path, &example_config())?;
    println!("Wrote {}", path.display());
    Ok(())
}
