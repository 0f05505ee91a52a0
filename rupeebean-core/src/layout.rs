//! Positional text as a PDF library reports it.
//!
//! Coordinates are top-down: `top < bottom`, origin at the top-left corner
//! of the page, in PDF points.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default vertical tolerance when clustering words into lines.
pub const LINE_TOLERANCE: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, x0: f64, x1: f64, top: f64, bottom: f64) -> Self {
        Self {
            text: text.into(),
            x0,
            x1,
            top,
            bottom,
        }
    }

    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    /// Horizontal overlap with `[x0, x1]`.
    pub fn overlaps_x(&self, x0: f64, x1: f64) -> bool {
        self.x0 < x1 && x0 < self.x1
    }
}

/// A horizontal ruling line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
}

impl Rule {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub words: Vec<Word>,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
}

impl TextLine {
    fn from_words(mut words: Vec<Word>) -> Self {
        words.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        let x0 = words.iter().map(|w| w.x0).fold(f64::INFINITY, f64::min);
        let x1 = words.iter().map(|w| w.x1).fold(f64::NEG_INFINITY, f64::max);
        let top = words.iter().map(|w| w.top).fold(f64::INFINITY, f64::min);
        let bottom = words.iter().map(|w| w.bottom).fold(f64::NEG_INFINITY, f64::max);
        Self {
            words,
            x0,
            x1,
            top,
            bottom,
        }
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Cluster words into lines, top to bottom, each line left to right.
pub fn group_lines(words: &[Word], y_tolerance: f64) -> Vec<TextLine> {
    let mut sorted: Vec<Word> = words.to_vec();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut lines = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut anchor = f64::NEG_INFINITY;
    for w in sorted {
        if !current.is_empty() && (w.top - anchor).abs() > y_tolerance {
            lines.push(TextLine::from_words(std::mem::take(&mut current)));
        }
        if current.is_empty() {
            anchor = w.top;
        }
        current.push(w);
    }
    if !current.is_empty() {
        lines.push(TextLine::from_words(current));
    }
    lines
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based page number.
    pub number: usize,
    pub width: f64,
    pub height: f64,
    pub words: Vec<Word>,
    pub rules: Vec<Rule>,
}

impl PageLayout {
    pub fn new(number: usize, width: f64, height: f64) -> Self {
        Self {
            number,
            width,
            height,
            words: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn lines(&self) -> Vec<TextLine> {
        group_lines(&self.words, LINE_TOLERANCE)
    }

    pub fn text(&self) -> String {
        self.lines()
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First line whose text matches `re`.
    pub fn find_line(&self, re: &Regex) -> Option<TextLine> {
        self.lines().into_iter().find(|l| re.is_match(&l.text()))
    }

    /// Keep the words whose centre falls inside the box.
    pub fn crop(&self, x0: f64, top: f64, x1: f64, bottom: f64) -> PageLayout {
        let words = self
            .words
            .iter()
            .filter(|w| {
                let (cx, cy) = (w.center_x(), w.center_y());
                cx >= x0 && cx <= x1 && cy >= top && cy <= bottom
            })
            .cloned()
            .collect();
        let rules = self
            .rules
            .iter()
            .filter(|r| r.y >= top && r.y <= bottom)
            .copied()
            .collect();
        PageLayout {
            number: self.number,
            width: self.width,
            height: self.height,
            words,
            rules,
        }
    }
}

/// Text of every page, pages separated by newlines.
pub fn document_text(pages: &[PageLayout]) -> String {
    pages
        .iter()
        .map(PageLayout::text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(text: &str, x0: f64, top: f64) -> Word {
        Word::new(text, x0, x0 + 6.0 * text.len() as f64, top, top + 10.0)
    }

    #[test]
    fn test_group_lines_clusters_by_top() {
        let words = vec![
            w("Balance", 300.0, 101.5),
            w("Opening", 200.0, 100.0),
            w("01/04/2024", 50.0, 130.0),
            w("Closing", 200.0, 160.2),
        ];
        let lines = group_lines(&words, LINE_TOLERANCE);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text(), "Opening Balance");
        assert_eq!(lines[0].top, 100.0);
        assert_eq!(lines[1].text(), "01/04/2024");
        assert_eq!(lines[2].text(), "Closing");
    }

    #[test]
    fn test_page_text_and_find_line() {
        let page = PageLayout::new(1, 595.0, 842.0).with_words(vec![
            w("Account", 40.0, 50.0),
            w("12345678", 100.0, 50.0),
            w("Txn", 40.0, 90.0),
            w("Date", 62.0, 90.0),
        ]);
        assert_eq!(page.text(), "Account 12345678\nTxn Date");
        let re = Regex::new(r"^Txn Date").unwrap();
        let line = page.find_line(&re).unwrap();
        assert_eq!(line.words.len(), 2);
        assert!(page.find_line(&Regex::new("Missing").unwrap()).is_none());
    }

    #[test]
    fn test_crop_keeps_words_inside() {
        let page = PageLayout::new(1, 595.0, 842.0)
            .with_words(vec![w("in", 200.0, 300.0), w("out", 10.0, 300.0)])
            .with_rules(vec![Rule { x0: 0.0, x1: 500.0, y: 310.0 }]);
        let cropped = page.crop(160.0, 205.0, 600.0, 475.0);
        assert_eq!(cropped.words.len(), 1);
        assert_eq!(cropped.words[0].text, "in");
        assert_eq!(cropped.rules.len(), 1);
    }

    #[test]
    fn test_document_text_joins_pages() {
        let p1 = PageLayout::new(1, 100.0, 100.0).with_words(vec![w("one", 0.0, 0.0)]);
        let p2 = PageLayout::new(2, 100.0, 100.0).with_words(vec![w("two", 0.0, 0.0)]);
        assert_eq!(document_text(&[p1, p2]), "one\ntwo");
    }
}
