use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rupeebean_core::ledger::{sort_directives, Directive};
use rupeebean_core::render::render_all;
use rupeebean_finance::bse::BseClient;
use rupeebean_finance::yahoo::{decode_ticker, YahooSource};
use rupeebean_ingest::importer::Importer;
use rupeebean_ingest::source::SourceFile;

mod archive;
mod config;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "rupeebean",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("RUPEEBEAN_BUILD_SHA"), ")"),
    about = "Beancount importers for Indian bank, card and broker statements"
)]
struct Cli {
    /// Config file (default: ~/.rupeebean/config.toml)
    #[arg(long, global = true, env = "RUPEEBEAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print which importer claims each file
    Identify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print beancount entries for every identified file
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Sort each file's entries by date
        #[arg(long)]
        sort: bool,
    },

    /// Print opening/closing balance assertions
    Balances {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Move identified files to DEST/<account path>/<date>.<name>
    Archive {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        dest: PathBuf,

        /// Only print the moves
        #[arg(long)]
        dry_run: bool,
    },

    /// Print commodity declarations for every BSE-listed company
    Commodities,

    /// Print a price directive for a Yahoo ticker
    Prices {
        /// Yahoo ticker, e.g. RELIANCE.BO or RELIANCE.BO:INR:close
        ticker: String,

        /// Price on this date instead of the latest one
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Commodity name (default: ticker without the exchange suffix)
        #[arg(long)]
        commodity: Option<String>,
    },

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write an example config if none exists
    Init,

    /// Print the resolved config
    Show,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = config::config_path(cli.config.as_deref())?;

    match cli.command {
        Command::Identify { files } => {
            let importers = load_importers(&config_path).await?;
            for path in files {
                let file = SourceFile::new(path.clone());
                match identify(&importers, &file) {
                    Some(imp) => println!("{}: {}", path.display(), imp.name()),
                    None => println!("{}: (not identified)", path.display()),
                }
            }
        }

        Command::Extract { files, sort } => {
            let importers = load_importers(&config_path).await?;
            for path in files {
                let file = SourceFile::new(path.clone());
                let Some(imp) = identify(&importers, &file) else {
                    warn!(file = %path.display(), "no importer identifies this file");
                    continue;
                };
                let mut entries = imp
                    .extract(&file)
                    .with_context(|| format!("extract {} with {}", path.display(), imp.name()))?;
                if sort {
                    sort_directives(&mut entries);
                }
                print_block(&path, imp.name(), &entries);
            }
        }

        Command::Balances { files } => {
            let importers = load_importers(&config_path).await?;
            for path in files {
                let file = SourceFile::new(path.clone());
                let Some(imp) = identify(&importers, &file) else {
                    warn!(file = %path.display(), "no importer identifies this file");
                    continue;
                };
                let balances = imp
                    .balances(&file)
                    .with_context(|| format!("balances of {}", path.display()))?;
                print_block(&path, imp.name(), &balances);
            }
        }

        Command::Archive { files, dest, dry_run } => {
            let importers = load_importers(&config_path).await?;
            for path in files {
                let file = SourceFile::new(path.clone());
                let Some(imp) = identify(&importers, &file) else {
                    warn!(file = %path.display(), "no importer identifies this file, leaving it");
                    continue;
                };
                let to = archive::plan(imp, &file, &dest)
                    .with_context(|| format!("file {}", path.display()))?;
                if dry_run {
                    println!("{} -> {}", path.display(), to.display());
                } else {
                    archive::move_file(&path, &to)?;
                }
            }
        }

        Command::Commodities => {
            let bse = BseClient::open(&state::bse_path()?).await?;
            print!("{}", bse.snapshot().export_commodity_declarations());
        }

        Command::Prices { ticker, date, commodity } => {
            let yahoo = YahooSource::new()?;
            let price = match date {
                Some(d) => yahoo.historical_price(&ticker, d).await?,
                None => yahoo.latest_price(&ticker, Local::now().date_naive()).await?,
            };
            let Some(price) = price else {
                bail!("no price for {ticker}");
            };
            let commodity = match commodity {
                Some(c) => c,
                None => default_commodity(&ticker)?,
            };
            print!("{}", render_all(&[Directive::from(price.to_price(&commodity))]));
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(&config_path)?,
            ConfigCommand::Show => {
                let cfg = config::load_config(&config_path)?;
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

async fn load_importers(path: &Path) -> Result<Vec<Box<dyn Importer>>> {
    let cfg = config::load_config(path)?;
    if cfg.importers.is_empty() {
        bail!(
            "no importers configured in {} (run: rupeebean config init)",
            path.display()
        );
    }
    let importers = config::build_importers(&cfg).await?;
    info!(count = importers.len(), "importers loaded");
    Ok(importers)
}

/// First importer that claims `file`; more than one claim is logged.
fn identify<'a>(importers: &'a [Box<dyn Importer>], file: &SourceFile) -> Option<&'a dyn Importer> {
    let mut claims = importers.iter().filter(|imp| imp.identify(file));
    let first = claims.next()?;
    let others: Vec<&str> = claims.map(|imp| imp.name()).collect();
    if !others.is_empty() {
        warn!(
            file = %file.path().display(),
            chosen = first.name(),
            others = ?others,
            "several importers identify this file"
        );
    }
    Some(first.as_ref())
}

fn print_block(path: &Path, importer: &str, entries: &[Directive]) {
    println!(";; {} ({importer})\n", path.display());
    if !entries.is_empty() {
        println!("{}", render_all(entries));
    }
}

/// `RELIANCE.BO` prices the `RELIANCE` commodity.
fn default_commodity(ticker: &str) -> Result<String> {
    let base = decode_ticker(ticker)?.base;
    let name = base.split('.').next().unwrap_or(&base);
    Ok(name.trim_start_matches('^').to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_commodity() {
        assert_eq!(default_commodity("RELIANCE.BO").unwrap(), "RELIANCE");
        assert_eq!(default_commodity("_5ENSEI:INR").unwrap(), "NSEI");
    }

    #[test]
    fn test_cli_parses_archive() {
        let cli = Cli::try_parse_from([
            "rupeebean", "archive", "a.pdf", "b.csv", "--dest", "/docs", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Archive { files, dest, dry_run } => {
                assert_eq!(files.len(), 2);
                assert_eq!(dest, PathBuf::from("/docs"));
                assert!(dry_run);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_price_date() {
        let cli = Cli::try_parse_from(["rupeebean", "prices", "INFY.BO", "--date", "2024-01-05"]).unwrap();
        match cli.command {
            Command::Prices { ticker, date, .. } => {
                assert_eq!(ticker, "INFY.BO");
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
