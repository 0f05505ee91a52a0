//! Table reconstruction from positional text.
//!
//! Statements rarely carry real table structure. A [`TableSpec`] names the
//! header captions to look for; their positions on the page give the column
//! geometry, and a [`RowBreak`] rule decides how physical lines become rows.

use std::cmp::Reverse;
use std::collections::HashSet;

use anyhow::{bail, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::layout::{group_lines, PageLayout, TextLine, LINE_TOLERANCE};

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    /// Header caption as printed; may span several words.
    pub anchor: String,
    /// Missing optional columns leave their cells blank.
    pub optional: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            anchor: name.clone(),
            name,
            optional: false,
        }
    }

    pub fn anchored(name: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anchor: anchor.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum ColumnMode {
    /// A word goes to the column whose header extent overlaps it most.
    Overlap,
    /// Boundaries sit halfway between neighbouring headers.
    Partition,
    /// Explicit x separators, one fewer than there are columns.
    Fixed(Vec<f64>),
}

#[derive(Debug, Clone)]
pub enum RowBreak {
    EveryLine,
    /// A line whose cell in `column` matches `pattern` starts a row; other
    /// lines continue the current one.
    WhenMatches { column: usize, pattern: Regex },
    /// Horizontal rules at least `min_width` wide separate rows.
    Rules { min_width: f64 },
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    pub columns: Vec<ColumnSpec>,
    pub column_mode: ColumnMode,
    pub row_break: RowBreak,
    pub footer: Option<Regex>,
    pub row_tolerance: f64,
    /// How far below the first header line captions may still appear.
    pub header_band: f64,
    /// Reuse the last header geometry on pages that print no header.
    pub carry_header: bool,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            column_mode: ColumnMode::Partition,
            row_break: RowBreak::EveryLine,
            footer: None,
            row_tolerance: LINE_TOLERANCE,
            header_band: 0.0,
            carry_header: false,
        }
    }

    pub fn with_column_mode(mut self, mode: ColumnMode) -> Self {
        self.column_mode = mode;
        self
    }

    pub fn with_row_break(mut self, row_break: RowBreak) -> Self {
        self.row_break = row_break;
        self
    }

    pub fn with_footer(mut self, footer: Regex) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn with_row_tolerance(mut self, tolerance: f64) -> Self {
        self.row_tolerance = tolerance;
        self
    }

    pub fn with_header_band(mut self, band: f64) -> Self {
        self.header_band = band;
        self
    }

    pub fn with_carry_header(mut self, carry: bool) -> Self {
        self.carry_header = carry;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<String>,
    /// 1-based page the row starts on; 0 for grids without pages.
    pub page: usize,
    /// Line index within the page (or grid row index).
    pub line: usize,
}

impl Row {
    /// Cell text, empty when the row is short.
    pub fn get(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn column_matching(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers.iter().position(|h| pred(h.trim()))
    }

    /// Cell of `row` under header `name`; empty when the column is absent.
    pub fn get<'a>(&self, row: &'a Row, name: &str) -> &'a str {
        match self.column(name) {
            Some(idx) => row.get(idx),
            None => "",
        }
    }

    /// Build a table from a cell grid, taking headers from `header_row`.
    pub fn from_grid(grid: Vec<Vec<String>>, header_row: usize) -> Result<Table> {
        if header_row >= grid.len() {
            bail!("header row {header_row} beyond grid of {} rows", grid.len());
        }
        let mut it = grid.into_iter().enumerate().skip(header_row);
        let headers = match it.next() {
            Some((_, h)) => h.into_iter().map(|c| c.trim().to_string()).collect(),
            None => Vec::new(),
        };
        let rows = it
            .map(|(line, cells)| Row {
                cells,
                page: 0,
                line,
            })
            .collect();
        Ok(Table { headers, rows })
    }

    /// Append the rows of later tables; headers come from the first.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut out = Table::default();
        for t in tables {
            if out.headers.is_empty() {
                out.headers = t.headers;
            }
            out.rows.extend(t.rows);
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    column: usize,
    left: f64,
    right: f64,
}

struct HeaderMatch {
    body_start: usize,
    extents: Vec<Option<(f64, f64)>>,
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Consecutive words on one line whose joined text equals `target`.
fn find_anchor(
    lines: &[TextLine],
    target: &str,
    used: &HashSet<(usize, usize)>,
) -> Option<Vec<(usize, usize)>> {
    if target.is_empty() {
        return None;
    }
    for (li, line) in lines.iter().enumerate() {
        for start in 0..line.words.len() {
            let mut acc = String::new();
            let mut hits = Vec::new();
            for end in start..line.words.len() {
                if used.contains(&(li, end)) {
                    break;
                }
                acc.push_str(&squash(&line.words[end].text));
                hits.push((li, end));
                if acc == target {
                    return Some(hits);
                }
                if !target.starts_with(&acc) {
                    break;
                }
            }
        }
    }
    None
}

fn locate_header(lines: &[TextLine], spec: &TableSpec) -> Option<HeaderMatch> {
    let fixed = matches!(spec.column_mode, ColumnMode::Fixed(_));
    let first = spec.columns.iter().find(|c| !c.optional)?;
    let first_target = squash(&first.anchor);

    let mut order: Vec<usize> = (0..spec.columns.len()).collect();
    order.sort_by_key(|&k| Reverse(spec.columns[k].anchor.split_whitespace().count()));

    for (i, line) in lines.iter().enumerate() {
        if find_anchor(std::slice::from_ref(line), &first_target, &HashSet::new()).is_none() {
            continue;
        }
        let band_len = lines[i..]
            .iter()
            .take_while(|l| l.top <= line.top + spec.header_band)
            .count();
        let band = &lines[i..i + band_len];

        let mut used = HashSet::new();
        let mut extents = vec![None; spec.columns.len()];
        let mut complete = true;
        for &k in &order {
            let col = &spec.columns[k];
            match find_anchor(band, &squash(&col.anchor), &used) {
                Some(hits) => {
                    let words: Vec<_> = hits.iter().map(|&(l, w)| &band[l].words[w]).collect();
                    let x0 = words.iter().map(|w| w.x0).fold(f64::INFINITY, f64::min);
                    let x1 = words.iter().map(|w| w.x1).fold(f64::NEG_INFINITY, f64::max);
                    extents[k] = Some((x0, x1));
                    used.extend(hits);
                }
                None if col.optional || fixed => {}
                None => {
                    debug!(column = %col.name, line = i, "header caption not found");
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            return Some(HeaderMatch {
                body_start: i + band_len,
                extents,
            });
        }
    }
    None
}

fn slots_for(extents: &[Option<(f64, f64)>], mode: &ColumnMode) -> Result<Vec<Slot>> {
    let n = extents.len();
    match mode {
        ColumnMode::Overlap => Ok(extents
            .iter()
            .enumerate()
            .filter_map(|(column, e)| e.map(|(left, right)| Slot { column, left, right }))
            .collect()),
        ColumnMode::Partition => {
            let mut present: Vec<(usize, f64, f64)> = extents
                .iter()
                .enumerate()
                .filter_map(|(k, e)| e.map(|(a, b)| (k, a, b)))
                .collect();
            present.sort_by(|a, b| a.1.total_cmp(&b.1));
            let mut slots = Vec::with_capacity(present.len());
            for (idx, &(column, _, x1)) in present.iter().enumerate() {
                let left = if idx == 0 {
                    f64::NEG_INFINITY
                } else {
                    let (_, _, prev_x1) = present[idx - 1];
                    (prev_x1 + present[idx].1) / 2.0
                };
                let right = match present.get(idx + 1) {
                    Some(&(_, next_x0, _)) => (x1 + next_x0) / 2.0,
                    None => f64::INFINITY,
                };
                slots.push(Slot { column, left, right });
            }
            Ok(slots)
        }
        ColumnMode::Fixed(bounds) => {
            if bounds.len() + 1 != n {
                bail!(
                    "fixed layout needs {} separators for {n} columns, got {}",
                    n.saturating_sub(1),
                    bounds.len()
                );
            }
            Ok((0..n)
                .map(|column| Slot {
                    column,
                    left: if column == 0 { f64::NEG_INFINITY } else { bounds[column - 1] },
                    right: if column == n - 1 { f64::INFINITY } else { bounds[column] },
                })
                .collect())
        }
    }
}

/// Column of the rightmost caption starting at or before `x`; words left
/// of every caption belong to the leftmost column.
fn nearest_left(x: f64, slots: &[Slot]) -> Option<usize> {
    slots
        .iter()
        .filter(|s| s.left <= x)
        .max_by(|a, b| a.left.total_cmp(&b.left))
        .or_else(|| slots.iter().min_by(|a, b| a.left.total_cmp(&b.left)))
        .map(|s| s.column)
}

fn cells_of(line: &TextLine, slots: &[Slot], mode: &ColumnMode, n: usize) -> Vec<String> {
    let mut parts: Vec<Vec<&str>> = vec![Vec::new(); n];
    for word in &line.words {
        let column = match mode {
            ColumnMode::Overlap => slots
                .iter()
                .map(|s| (s.column, word.x1.min(s.right) - word.x0.max(s.left)))
                .filter(|&(_, overlap)| overlap > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(c, _)| c)
                .or_else(|| nearest_left(word.x0, slots)),
            _ => {
                let cx = word.center_x();
                slots
                    .iter()
                    .find(|s| cx >= s.left && cx < s.right)
                    .map(|s| s.column)
            }
        };
        match column {
            Some(c) => parts[c].push(&word.text),
            None => debug!(word = %word.text, "word outside every column"),
        }
    }
    parts.into_iter().map(|p| p.join(" ")).collect()
}

fn merge_into(target: &mut [String], cells: Vec<String>) {
    for (slot, cell) in target.iter_mut().zip(cells) {
        if cell.is_empty() {
            continue;
        }
        if slot.is_empty() {
            *slot = cell;
        } else {
            slot.push(' ');
            slot.push_str(&cell);
        }
    }
}

/// Reconstruct one logical table spread over `pages`.
pub fn extract_table(pages: &[PageLayout], spec: &TableSpec) -> Result<Table> {
    let n = spec.columns.len();
    let mut rows: Vec<Row> = Vec::new();
    let mut current: Option<Row> = None;
    let mut geometry: Option<Vec<Slot>> = None;

    for page in pages {
        let lines = group_lines(&page.words, spec.row_tolerance);
        let body_start = match locate_header(&lines, spec) {
            Some(header) => {
                geometry = Some(slots_for(&header.extents, &spec.column_mode)?);
                header.body_start
            }
            None if spec.carry_header && geometry.is_some() => 0,
            None => {
                info!(page = page.number, "no table header on page, skipping");
                continue;
            }
        };
        let Some(slots) = geometry.as_deref() else {
            continue;
        };

        let body_end = match &spec.footer {
            Some(footer) => lines[body_start..]
                .iter()
                .position(|l| footer.is_match(&l.text()))
                .map_or(lines.len(), |p| body_start + p),
            None => lines.len(),
        };
        let body = &lines[body_start..body_end];

        match &spec.row_break {
            RowBreak::EveryLine => {
                for (offset, line) in body.iter().enumerate() {
                    let row = Row {
                        cells: cells_of(line, slots, &spec.column_mode, n),
                        page: page.number,
                        line: body_start + offset,
                    };
                    if !row.is_empty() {
                        rows.push(row);
                    }
                }
            }
            RowBreak::WhenMatches { column, pattern } => {
                for (offset, line) in body.iter().enumerate() {
                    let cells = cells_of(line, slots, &spec.column_mode, n);
                    let starts = cells.get(*column).is_some_and(|c| pattern.is_match(c.trim()));
                    if starts {
                        rows.extend(current.take());
                        current = Some(Row {
                            cells,
                            page: page.number,
                            line: body_start + offset,
                        });
                    } else if let Some(row) = current.as_mut() {
                        merge_into(&mut row.cells, cells);
                    }
                }
            }
            RowBreak::Rules { min_width } => {
                let (Some(first), Some(last)) = (body.first(), body.last()) else {
                    continue;
                };
                let (body_top, body_bottom) = (first.top, last.bottom);
                let mut ys: Vec<f64> = page
                    .rules
                    .iter()
                    .filter(|r| r.width() >= *min_width && r.y > body_top && r.y < body_bottom)
                    .map(|r| r.y)
                    .collect();
                ys.sort_by(f64::total_cmp);

                let mut band_rows: Vec<(usize, Row)> = Vec::new();
                for (offset, line) in body.iter().enumerate() {
                    let mid = (line.top + line.bottom) / 2.0;
                    let band = ys.iter().filter(|&&y| y <= mid).count();
                    let cells = cells_of(line, slots, &spec.column_mode, n);
                    if let Some((_, row)) = band_rows.last_mut().filter(|(b, _)| *b == band) {
                        merge_into(&mut row.cells, cells);
                    } else {
                        let row = Row {
                            cells,
                            page: page.number,
                            line: body_start + offset,
                        };
                        band_rows.push((band, row));
                    }
                }
                rows.extend(band_rows.into_iter().map(|(_, r)| r).filter(|r| !r.is_empty()));
            }
        }
    }
    rows.extend(current.take());

    if geometry.is_none() {
        warn!(pages = pages.len(), "table header not found on any page");
    }
    debug!(rows = rows.len(), "table extracted");
    Ok(Table {
        headers: spec.columns.iter().map(|c| c.name.clone()).collect(),
        rows,
    })
}
