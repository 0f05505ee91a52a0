//! rupeebean-core: ledger model, statement parsing helpers and positional
//! table reconstruction shared by every importer.

pub mod layout;
pub mod ledger;
pub mod parse;
pub mod render;
pub mod table;

pub use layout::{document_text, group_lines, PageLayout, Rule, TextLine, Word};
pub use ledger::{
    sort_directives, Amount, Balance, Commodity, CostSpec, Directive, Flag, Meta, Posting, Price,
    Source, Transaction, INR,
};
pub use parse::{
    collapse_whitespace, credit_marked_amount, debit_or_credit, find_date, is_blank, parse_amount,
    parse_date, parse_date_fuzzy, split_drcr, DateOrder, DrCr,
};
pub use render::{render, render_all};
pub use table::{extract_table, ColumnMode, ColumnSpec, Row, RowBreak, Table, TableSpec};
