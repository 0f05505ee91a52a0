//! A statement file on disk with memoized reads.
//!
//! Identification and extraction both look at the same file; each reader
//! result is computed once per [`SourceFile`].

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use rupeebean_core::layout::{document_text, PageLayout};

use crate::{pdf, sheet};

pub type Pages = Rc<Vec<PageLayout>>;
pub type Grid = Rc<Vec<Vec<String>>>;

#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    text: OnceCell<String>,
    layouts: RefCell<HashMap<Option<String>, Pages>>,
    sheets: RefCell<HashMap<usize, Grid>>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: OnceCell::new(),
            layouts: RefCell::new(HashMap::new()),
            sheets: RefCell::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// MIME type guessed from the extension.
    pub fn mime_type(&self) -> Option<&'static str> {
        let mime = match self.extension()?.as_str() {
            "pdf" => "application/pdf",
            "csv" => "text/csv",
            "html" | "htm" => "text/html",
            "txt" => "text/plain",
            "xls" => "application/vnd.ms-excel",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            _ => return None,
        };
        Some(mime)
    }

    /// Whole file as text (lossy UTF-8, BOM stripped).
    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t);
        }
        let raw = fs::read(&self.path).with_context(|| format!("read {}", self.path.display()))?;
        let decoded = String::from_utf8_lossy(&raw);
        let body = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded).to_string();
        Ok(self.text.get_or_init(|| body))
    }

    /// PDF pages, decrypted with `password` when given.
    pub fn pages(&self, password: Option<&str>) -> Result<Pages> {
        let key = password.map(str::to_string);
        if let Some(pages) = self.layouts.borrow().get(&key) {
            return Ok(Rc::clone(pages));
        }
        let pages = Rc::new(pdf::load_layout(&self.path, password)?);
        self.layouts.borrow_mut().insert(key, Rc::clone(&pages));
        Ok(pages)
    }

    /// Text of every PDF page, for grepping.
    pub fn pdf_text(&self, password: Option<&str>) -> Result<String> {
        Ok(document_text(&self.pages(password)?))
    }

    /// Worksheet `index` of a spreadsheet.
    pub fn sheet(&self, index: usize) -> Result<Grid> {
        if let Some(grid) = self.sheets.borrow().get(&index) {
            return Ok(Rc::clone(grid));
        }
        let grid = Rc::new(sheet::read_sheet(&self.path, index)?);
        self.sheets.borrow_mut().insert(index, Rc::clone(&grid));
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_strips_bom_and_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("stmt.csv");
        fs::write(&p, "\u{feff}DATE,MODE\n").unwrap();
        let f = SourceFile::new(&p);
        assert_eq!(f.text().unwrap(), "DATE,MODE\n");
        fs::write(&p, "changed").unwrap();
        assert_eq!(f.text().unwrap(), "DATE,MODE\n");
    }

    #[test]
    fn test_name_and_mime_type() {
        let f = SourceFile::new("/tmp/statements/2024-01-02.Statement.PDF");
        assert_eq!(f.name(), "2024-01-02.Statement.PDF");
        assert_eq!(f.mime_type(), Some("application/pdf"));
        assert_eq!(SourceFile::new("mail.html").mime_type(), Some("text/html"));
        assert_eq!(SourceFile::new("a.xls").mime_type(), Some("application/vnd.ms-excel"));
        assert_eq!(SourceFile::new("noext").mime_type(), None);
    }

    #[test]
    fn test_missing_file_errors() {
        let f = SourceFile::new("/definitely/not/here.csv");
        assert!(f.text().is_err());
        assert!(f.pages(None).is_err());
    }
}
