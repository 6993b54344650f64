//! Raw grid → canonical table.
//!
//! The row at `header_row` names the columns; every row after it becomes a
//! [`RowRecord`]. Rows above the header are discarded.
//!
//! Column rules:
//! - header cells are stringified and trimmed; blank ones name no column
//! - a repeated header name keeps its first position in `headers`, and the
//!   rightmost column with that name wins in each record
//! - short rows leave trailing columns blank; long rows are cut to the header

use std::collections::HashSet;

use crate::models::{CanonicalTable, CellValue, RowRecord};

/// Build a [`CanonicalTable`] from a raw grid.
///
/// A header row beyond the end of the grid yields an empty table, not an
/// error.
pub fn normalize(grid: &[Vec<CellValue>], header_row: usize, source_name: &str) -> CanonicalTable {
    let Some(header_cells) = grid.get(header_row) else {
        return CanonicalTable::empty(source_name);
    };

    let columns: Vec<(usize, String)> = header_cells
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let name = header_name(cell);
            (!name.is_empty()).then_some((idx, name))
        })
        .collect();

    let mut seen = HashSet::new();
    let headers: Vec<String> = columns
        .iter()
        .filter(|(_, name)| seen.insert(name.as_str()))
        .map(|(_, name)| name.clone())
        .collect();

    let rows = grid[header_row + 1..]
        .iter()
        .map(|row| {
            let mut record = RowRecord::new();
            for (idx, name) in &columns {
                record.insert(name.clone(), row.get(*idx).cloned().unwrap_or_default());
            }
            record
        })
        .collect();

    CanonicalTable {
        source_name: source_name.to_string(),
        headers,
        rows,
    }
}

fn header_name(cell: &CellValue) -> String {
    cell.to_text()
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
