//! rupeebean-ingest: reading statement files (PDF, spreadsheets, CSV, DOCX,
//! HTML mail) and the bank-specific importers built on them.

pub mod csv_importer;
pub mod delimited;
pub mod docx;
pub mod html;
pub mod importer;
pub mod parsers;
pub mod pdf;
pub mod sheet;
pub mod source;
pub mod types;

pub use csv_importer::{CsvColumns, CsvImporter};
pub use importer::{find_balance, running_balances, statement_balances, strip_date_prefix, Importer};
pub use source::SourceFile;
pub use types::StatementRow;
