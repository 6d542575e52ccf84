//! Selection resolution over parsed tabular data.
//!
//! Turns a [`ParsedTable`] plus a row/column [`Selection`] into the concrete
//! column names and per-row values the rest of the pipeline operates on.
//! Pure; no external calls.

use std::collections::BTreeMap;

use crate::error::ScoutError;
use crate::models::{ParsedTable, Pick, Selection};

/// The concrete data a research request operates on.
#[derive(Debug, Clone)]
pub struct SelectedData {
    /// Names of the selected columns, in selection order.
    pub column_names: Vec<String>,
    /// Selected rows, each carrying its source-table index.
    pub rows: Vec<SelectedRow>,
}

/// One selected row: its index in the source table and the cell values for
/// the selected columns (short rows padded with `""`).
#[derive(Debug, Clone)]
pub struct SelectedRow {
    pub index: usize,
    pub values: Vec<String>,
}

impl SelectedRow {
    /// Column name → value mapping for this row.
    pub fn value_map(&self, column_names: &[String]) -> BTreeMap<String, String> {
        column_names
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// Resolve a selection against a table.
///
/// Out-of-range indices are discarded; a selection that is empty after
/// filtering means "use all" on that axis. Returns [`ScoutError::Input`]
/// when the table has no headers or no data rows.
pub fn select(table: &ParsedTable, selection: &Selection) -> Result<SelectedData, ScoutError> {
    if table.is_empty() {
        return Err(ScoutError::Input(
            "table has no headers or no data rows".to_string(),
        ));
    }

    let col_indices = resolve_pick(&selection.columns, table.headers.len());
    let row_indices = resolve_pick(&selection.rows, table.rows.len());

    let column_names: Vec<String> = col_indices
        .iter()
        .map(|&c| table.headers[c].clone())
        .collect();

    let rows: Vec<SelectedRow> = row_indices
        .iter()
        .map(|&r| SelectedRow {
            index: r,
            values: col_indices
                .iter()
                .map(|&c| table.cell(r, c).to_string())
                .collect(),
        })
        .collect();

    Ok(SelectedData { column_names, rows })
}

fn resolve_pick(pick: &Pick, len: usize) -> Vec<usize> {
    match pick {
        Pick::All => (0..len).collect(),
        Pick::Indices(indices) => {
            let kept: Vec<usize> = indices.iter().copied().filter(|&i| i < len).collect();
            if kept.is_empty() {
                (0..len).collect()
            } else {
                kept
            }
        }
        Pick::Head(n) => {
            let n = if *n == 0 { len } else { (*n).min(len) };
            (0..n).collect()
        }
    }
}
