//! Positional text from PDF statements.
//!
//! `pdf-extract` walks the content streams and reports every glyph with its
//! text rendering matrix. [`LayoutCollector`] turns those glyphs into words
//! and keeps horizontal strokes as ruling lines.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use pdf_extract::{
    output_doc, output_doc_encrypted, ColorSpace, Document, MediaBox, OutputDev, OutputError,
    PathOp, Transform,
};
use rupeebean_core::layout::{PageLayout, Rule, Word};
use tracing::{debug, info};

/// Horizontal gap (points) that splits two glyphs into separate words.
const X_TOLERANCE: f64 = 3.0;
/// Strokes thinner than this count as ruling lines.
const RULE_THICKNESS: f64 = 2.0;

#[derive(Debug)]
struct PendingWord {
    text: String,
    x0: f64,
    x1: f64,
    baseline: f64,
    size: f64,
}

#[derive(Debug, Default)]
struct LayoutCollector {
    pages: Vec<PageLayout>,
    page: Option<PageLayout>,
    llx: f64,
    ury: f64,
    pending: Option<PendingWord>,
}

fn apply(t: &Transform, x: f64, y: f64) -> (f64, f64) {
    (x * t.m11 + y * t.m21 + t.m31, x * t.m12 + y * t.m22 + t.m32)
}

impl LayoutCollector {
    fn flush_word(&mut self) {
        let (Some(w), Some(page)) = (self.pending.take(), self.page.as_mut()) else {
            return;
        };
        let bottom = self.ury - w.baseline;
        page.words
            .push(Word::new(w.text, w.x0 - self.llx, w.x1 - self.llx, bottom - w.size, bottom));
    }

    fn push_rule(&mut self, xa: f64, xb: f64, y: f64) {
        if let Some(page) = self.page.as_mut() {
            page.rules.push(Rule {
                x0: xa.min(xb) - self.llx,
                x1: xa.max(xb) - self.llx,
                y: self.ury - y,
            });
        }
    }

    fn collect_rules(&mut self, ctm: &Transform, path: &pdf_extract::Path, stroked: bool) {
        let mut cursor = (0.0, 0.0);
        let mut start = (0.0, 0.0);
        for op in &path.ops {
            match *op {
                PathOp::MoveTo(x, y) => {
                    cursor = apply(ctm, x, y);
                    start = cursor;
                }
                PathOp::LineTo(x, y) => {
                    let next = apply(ctm, x, y);
                    if (next.1 - cursor.1).abs() < RULE_THICKNESS && (next.0 - cursor.0).abs() > 0.0 {
                        self.push_rule(cursor.0, next.0, (cursor.1 + next.1) / 2.0);
                    }
                    cursor = next;
                }
                PathOp::CurveTo(_, _, _, _, x, y) => cursor = apply(ctm, x, y),
                PathOp::Rect(x, y, w, h) => {
                    let a = apply(ctm, x, y);
                    let b = apply(ctm, x + w, y + h);
                    if (b.1 - a.1).abs() < RULE_THICKNESS {
                        self.push_rule(a.0, b.0, (a.1 + b.1) / 2.0);
                    } else if stroked {
                        self.push_rule(a.0, b.0, a.1);
                        self.push_rule(a.0, b.0, b.1);
                    }
                    cursor = a;
                    start = a;
                }
                PathOp::Close => cursor = start,
            }
        }
    }
}

impl OutputDev for LayoutCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.llx = media_box.llx;
        self.ury = media_box.ury;
        self.page = Some(PageLayout::new(
            page_num as usize,
            media_box.urx - media_box.llx,
            media_box.ury - media_box.lly,
        ));
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush_word();
        if let Some(page) = self.page.take() {
            debug!(page = page.number, words = page.words.len(), rules = page.rules.len(), "pdf page");
            self.pages.push(page);
        }
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        ch: &str,
    ) -> Result<(), OutputError> {
        let scale_x = (trm.m11 * trm.m11 + trm.m12 * trm.m12).sqrt();
        let scale_y = (trm.m21 * trm.m21 + trm.m22 * trm.m22).sqrt();
        let size = font_size * scale_y;
        let (x, baseline) = (trm.m31, trm.m32);
        let advance = width * font_size * scale_x;

        if ch.trim().is_empty() {
            self.flush_word();
            return Ok(());
        }

        let continues = self.pending.as_ref().is_some_and(|w| {
            let gap = x - w.x1;
            (baseline - w.baseline).abs() <= w.size.max(size) * 0.5
                && gap <= X_TOLERANCE
                && gap >= -w.size.max(size)
        });
        if !continues {
            self.flush_word();
        }
        match self.pending.as_mut() {
            Some(w) => {
                w.text.push_str(ch);
                w.x1 = w.x1.max(x + advance);
                w.size = w.size.max(size);
            }
            None => {
                self.pending = Some(PendingWord {
                    text: ch.to_string(),
                    x0: x,
                    x1: x + advance,
                    baseline,
                    size,
                })
            }
        }
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        self.flush_word();
        Ok(())
    }

    fn stroke(
        &mut self,
        ctm: &Transform,
        _colorspace: &ColorSpace,
        _color: &[f64],
        path: &pdf_extract::Path,
    ) -> Result<(), OutputError> {
        self.collect_rules(ctm, path, true);
        Ok(())
    }

    fn fill(
        &mut self,
        ctm: &Transform,
        _colorspace: &ColorSpace,
        _color: &[f64],
        path: &pdf_extract::Path,
    ) -> Result<(), OutputError> {
        self.collect_rules(ctm, path, false);
        Ok(())
    }
}

/// Load every page of `path` as positional words and rules.
///
/// Encrypted statements are opened with `password`; documents encrypted
/// with an empty user password open without one.
pub fn load_layout(path: &Path, password: Option<&str>) -> Result<Vec<PageLayout>> {
    let mut doc = Document::load(path).with_context(|| format!("open pdf {}", path.display()))?;
    let mut collector = LayoutCollector::default();

    let outcome = if doc.is_encrypted() {
        match password {
            Some(pw) => output_doc_encrypted(&mut doc, &mut collector, pw),
            None => {
                if doc.decrypt("").is_err() {
                    bail!("{} is encrypted and no password is configured", path.display());
                }
                output_doc(&doc, &mut collector)
            }
        }
    } else {
        output_doc(&doc, &mut collector)
    };
    outcome.map_err(|e| anyhow!("extract layout from {}: {e}", path.display()))?;

    info!(path = %path.display(), pages = collector.pages.len(), "pdf loaded");
    Ok(collector.pages)
}
