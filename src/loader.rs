//! CSV file loading.
//!
//! Reads a local delimited file into a [`ParsedTable`]: the first record is
//! the header row, every following record is a data row. Cells are trimmed
//! and fully empty records are skipped. Upload/storage mechanics live with
//! the callers; this is the thin adapter the CLI uses.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::ParsedTable;

pub fn load_table(path: &Path) -> Result<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open table file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| "Failed to read header row")?
        .iter()
        .map(|value| value.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| "Failed to read data row")?;
        let values: Vec<String> = record.iter().map(|value| value.trim().to_string()).collect();
        if values.iter().all(|value| value.is_empty()) {
            continue;
        }
        rows.push(values);
    }

    Ok(ParsedTable::new(headers, rows))
}
