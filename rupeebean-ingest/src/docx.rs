//! Word (`.docx`) statements: tables and paragraph text from
//! `word/document.xml`.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use zip::ZipArchive;

/// Upper bound for the uncompressed document part.
const MAX_DOCUMENT_SIZE: u64 = 64 * 1024 * 1024;

pub type Grid = Vec<Vec<String>>;

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("docx regex"))
}

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"(?s)<w:tbl(?:\s[^>]*)?>.*?</w:tbl>")
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"(?s)<w:tr(?:\s[^>]*)?>.*?</w:tr>")
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"(?s)<w:tc(?:\s[^>]*)?>.*?</w:tc>")
}

fn para_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"(?s)<w:p(?:\s[^>]*)?>.*?</w:p>|<w:p(?:\s[^>]*)?/>")
}

fn para_props_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"(?s)<w:pPr(?:\s[^>]*)?>.*?</w:pPr>")
}

/// A text run, or a tab or line break between runs.
fn run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(
        &RE,
        r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)(?:\s[^>]*)?/>",
    )
}

fn char_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));")
}

fn unescape(s: &str) -> String {
    let decoded = char_ref_re().replace_all(s, |c: &regex::Captures| {
        let code = match (c.get(1), c.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        match code.and_then(char::from_u32) {
            Some(ch) => ch.to_string(),
            None => c[0].to_string(),
        }
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn paragraph_text(xml: &str) -> String {
    // Tab stops in paragraph properties are not content.
    let body = para_props_re().replace_all(xml, "");
    run_re()
        .captures_iter(&body)
        .map(|c| match c.get(2).map(|m| m.as_str()) {
            Some("tab") => "\t".to_string(),
            Some(_) => "\n".to_string(),
            None => unescape(&c[1]),
        })
        .collect()
}

fn block_text(xml: &str) -> String {
    para_re()
        .find_iter(xml)
        .map(|m| paragraph_text(m.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every table in document order, each as rows of cell text.
/// Paragraphs inside a cell are joined with newlines.
pub fn tables_from_xml(xml: &str) -> Vec<Grid> {
    table_re()
        .find_iter(xml)
        .map(|table| {
            row_re()
                .find_iter(table.as_str())
                .map(|row| {
                    cell_re()
                        .find_iter(row.as_str())
                        .map(|cell| block_text(cell.as_str()).trim().to_string())
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Paragraph text of the whole body, tables included.
pub fn text_from_xml(xml: &str) -> String {
    block_text(xml)
}

pub fn read_document_xml(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut archive = ZipArchive::new(file).context("read docx archive")?;
    let mut part = archive
        .by_name("word/document.xml")
        .context("word/document.xml not found in docx")?;
    if part.size() > MAX_DOCUMENT_SIZE {
        bail!("{}: document part too large ({} bytes)", path.display(), part.size());
    }
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .with_context(|| format!("read document.xml from {}", path.display()))?;
    Ok(xml)
}

pub fn read_tables(path: &Path) -> Result<Vec<Grid>> {
    Ok(tables_from_xml(&read_document_xml(path)?))
}

pub fn read_text(path: &Path) -> Result<String> {
    Ok(text_from_xml(&read_document_xml(path)?))
}
