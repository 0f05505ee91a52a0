//! rupeebean-finance: BSE security master, Yahoo price source and the Groww
//! contract note importer.

pub mod bse;
pub mod groww;
pub mod yahoo;

pub use bse::{BseClient, BseSnapshot, TickerLookup};
pub use groww::GrowwImporter;
pub use yahoo::{decode_ticker, PriceType, SourcePrice, YahooSource};
