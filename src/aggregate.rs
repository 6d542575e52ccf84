//! Per-row result aggregation.
//!
//! [`ResultAggregator`] keeps, per request scope, the most recent
//! [`RowSearchResult`] for each row index. Uses `HashMap` behind
//! `std::sync::RwLock` for thread safety; recency is decided by a monotonic
//! sequence number assigned at record time, never by wall-clock.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{RowSearchResult, SearchHit};

struct StoredRow {
    seq: u64,
    result: RowSearchResult,
}

/// Scope-keyed store of per-row search results.
///
/// `record` upserts: a later record for the same `(scope, row_index)`
/// supersedes the earlier one entirely — records are never merged. Partial
/// results recorded before a cancellation are ordinary records.
pub struct ResultAggregator {
    scopes: RwLock<HashMap<Uuid, HashMap<usize, StoredRow>>>,
    next_seq: AtomicU64,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Record one row's retrieval output, superseding any earlier record
    /// for the same row index within the scope.
    pub fn record(
        &self,
        scope: Uuid,
        row_index: usize,
        query_text: String,
        query_used: String,
        row_values: BTreeMap<String, String>,
        results: Vec<SearchHit>,
    ) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let stored = StoredRow {
            seq,
            result: RowSearchResult {
                row_index,
                query_text,
                query_used,
                row_values,
                results,
                recorded_at: Utc::now(),
            },
        };

        let mut scopes = self.scopes.write().unwrap();
        let rows = scopes.entry(scope).or_default();
        match rows.get(&row_index) {
            Some(existing) if existing.seq > seq => {}
            _ => {
                rows.insert(row_index, stored);
            }
        }
    }

    /// All records for a scope, ordered by row index. Each row index appears
    /// at most once: the most recently recorded result.
    pub fn list_results(&self, scope: Uuid) -> Vec<RowSearchResult> {
        let scopes = self.scopes.read().unwrap();
        let mut results: Vec<RowSearchResult> = scopes
            .get(&scope)
            .map(|rows| rows.values().map(|s| s.result.clone()).collect())
            .unwrap_or_default();
        results.sort_by_key(|r| r.row_index);
        results
    }

    /// One row's record within a scope, if present.
    pub fn get(&self, scope: Uuid, row_index: usize) -> Option<RowSearchResult> {
        let scopes = self.scopes.read().unwrap();
        scopes
            .get(&scope)
            .and_then(|rows| rows.get(&row_index))
            .map(|s| s.result.clone())
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str) -> SearchHit {
        SearchHit(serde_json::json!({ "title": title }))
    }

    fn record_simple(agg: &ResultAggregator, scope: Uuid, row: usize, query: &str, n_hits: usize) {
        agg.record(
            scope,
            row,
            query.to_string(),
            format_used(query),
            BTreeMap::new(),
            (0..n_hits).map(|i| hit(&format!("{query} #{i}"))).collect(),
        );
    }

    fn format_used(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join("+")
    }

    #[test]
    fn records_are_listed_by_row_index() {
        let agg = ResultAggregator::new();
        let scope = Uuid::new_v4();
        record_simple(&agg, scope, 2, "row two", 3);
        record_simple(&agg, scope, 0, "row zero", 1);

        let results = agg.list_results(scope);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row_index, 0);
        assert_eq!(results[1].row_index, 2);
        assert_eq!(results[1].hit_count(), 3);
    }

    #[test]
    fn second_record_supersedes_first() {
        let agg = ResultAggregator::new();
        let scope = Uuid::new_v4();
        record_simple(&agg, scope, 0, "first attempt", 7);
        record_simple(&agg, scope, 0, "second attempt", 2);

        let results = agg.list_results(scope);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query_text, "second attempt");
        assert_eq!(results[0].hit_count(), 2, "records replace, never merge");
    }

    #[test]
    fn scopes_are_isolated() {
        let agg = ResultAggregator::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        record_simple(&agg, a, 0, "scope a", 1);
        record_simple(&agg, b, 0, "scope b", 5);

        assert_eq!(agg.list_results(a)[0].query_text, "scope a");
        assert_eq!(agg.list_results(b)[0].query_text, "scope b");
    }

    #[test]
    fn unknown_scope_is_empty() {
        let agg = ResultAggregator::new();
        assert!(agg.list_results(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn get_returns_single_row() {
        let agg = ResultAggregator::new();
        let scope = Uuid::new_v4();
        record_simple(&agg, scope, 3, "row three", 4);

        let row = agg.get(scope, 3).unwrap();
        assert_eq!(row.query_used, "row+three");
        assert!(agg.get(scope, 4).is_none());
    }

    #[test]
    fn record_keeps_both_query_forms() {
        let agg = ResultAggregator::new();
        let scope = Uuid::new_v4();
        record_simple(&agg, scope, 0, "\"price\" \"NTN\"", 0);

        let row = agg.get(scope, 0).unwrap();
        assert_eq!(row.query_text, "\"price\" \"NTN\"");
        assert_eq!(row.query_used, "\"price\"+\"NTN\"");
    }
}
