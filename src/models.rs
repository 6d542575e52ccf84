//! Core data models used throughout Table Scout.
//!
//! These types represent the tabular input, the generated query template,
//! the per-row filled queries, and the search results that flow through the
//! research pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parsed tabular data: a header row plus zero or more data rows.
///
/// Rows may be shorter than the header row; [`ParsedTable::cell`] substitutes
/// the empty string for missing cells rather than panicking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// True when there is nothing to research: no headers or no data rows.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }

    /// Cell value at `(row, col)`, or `""` when the row is short or absent.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One axis of a selection: which rows (or columns) to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    /// Use every index.
    All,
    /// Explicit zero-based indices. Out-of-range entries are discarded;
    /// if nothing survives filtering the selection means "use all".
    Indices(Vec<usize>),
    /// The first `n` indices (`0` means all).
    Head(usize),
}

/// A row/column selection over a [`ParsedTable`].
#[derive(Debug, Clone)]
pub struct Selection {
    pub rows: Pick,
    pub columns: Pick,
}

impl Selection {
    /// Select every row and column.
    pub fn all() -> Self {
        Self {
            rows: Pick::All,
            columns: Pick::All,
        }
    }

    /// Select explicit row and column indices.
    pub fn indices(rows: Vec<usize>, columns: Vec<usize>) -> Self {
        Self {
            rows: Pick::Indices(rows),
            columns: Pick::Indices(columns),
        }
    }

    /// Select the first `max_rows` rows and `max_columns` columns
    /// (`0` means all on that axis).
    pub fn head(max_rows: usize, max_columns: usize) -> Self {
        Self {
            rows: Pick::Head(max_rows),
            columns: Pick::Head(max_columns),
        }
    }
}

/// Where a query template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateProvenance {
    /// Extracted from the LLM response.
    Generated,
    /// Deterministic placeholder-only fallback, used when no template line
    /// could be extracted from the response.
    PlaceholderFallback,
}

/// A single-line search-query template with `[ColumnName]` placeholders.
///
/// Invariant: the text is a single line, free of literal `{`/`}` (JSON-shaped
/// LLM output is rejected during extraction) and of conversational filler.
/// Generated once per request and shared read-only across all selected rows.
#[derive(Debug, Clone, Serialize)]
pub struct QueryTemplate {
    pub text: String,
    pub provenance: TemplateProvenance,
}

impl QueryTemplate {
    pub fn is_fallback(&self) -> bool {
        self.provenance == TemplateProvenance::PlaceholderFallback
    }
}

/// A template with all placeholders substituted for one row.
///
/// Invariant: contains no remaining `[...]` placeholder token and uses
/// single-space separation. Empty only when every source value and intent
/// keyword was empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilledQuery {
    pub text: String,
}

impl FilledQuery {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One organic result from the search provider.
///
/// The provider's record shape (title, link, snippet, position, ...) is passed
/// through unmodified; accessors pull out the common display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHit(pub serde_json::Value);

impl SearchHit {
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(|v| v.as_str())
    }

    pub fn link(&self) -> Option<&str> {
        self.0.get("link").and_then(|v| v.as_str())
    }

    pub fn snippet(&self) -> Option<&str> {
        self.0.get("snippet").and_then(|v| v.as_str())
    }
}

/// Retrieval output for one data row within a research request.
///
/// Created once when the row's retrieval completes and immutable thereafter.
/// Re-running retrieval for the same row produces a new record that
/// supersedes this one in the aggregator; records are never merged.
#[derive(Debug, Clone, Serialize)]
pub struct RowSearchResult {
    /// Zero-based index of the row in the source table.
    pub row_index: usize,
    /// The filled query as generated by the template step.
    pub query_text: String,
    /// The provider-formatted query actually sent (`+`-joined tokens).
    pub query_used: String,
    /// Column name → raw row value, for the selected columns.
    pub row_values: BTreeMap<String, String>,
    /// Organic hits in provider order, pages concatenated in page order.
    pub results: Vec<SearchHit>,
    pub recorded_at: DateTime<Utc>,
}

impl RowSearchResult {
    pub fn hit_count(&self) -> usize {
        self.results.len()
    }
}
