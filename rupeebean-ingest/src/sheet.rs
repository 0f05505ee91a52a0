//! XLS/XLSX statements as a grid of strings.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};

/// Render one cell the way the bank's CSV export would print it.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => ndt.format("%d/%m/%Y").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{e:?}"),
    }
}

/// Read worksheet `index` (0-based) of `path` into rows of cell strings.
///
/// Rows and columns keep their absolute sheet positions: leading empty
/// rows and columns are padded back in.
pub fn read_sheet(path: &Path, index: usize) -> Result<Vec<Vec<String>>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(index)
        .ok_or_else(|| anyhow!("{} has no sheet {index}", path.display()))?
        .with_context(|| format!("read sheet {index} of {}", path.display()))?;
    let (top, left) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<String>> = vec![Vec::new(); top as usize];
    grid.extend(range.rows().map(|row| {
        std::iter::repeat_n(String::new(), left as usize)
            .chain(row.iter().map(cell_text))
            .collect()
    }));
    Ok(grid)
}

/// Sheet text with cells tab-separated, for identification.
pub fn grid_text(grid: &[Vec<String>]) -> String {
    grid.iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}
