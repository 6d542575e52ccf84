//! Research request orchestration.
//!
//! One request = one template generation, then one fill + one paginated
//! search per selected row. Rows are independent and run concurrently on a
//! semaphore-bounded worker pool; the inter-request spacing budget
//! ([`RateLimiter`]) is shared across workers, not per-worker. A row-level
//! search failure aborts only that row; template failure aborts the request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::ResultAggregator;
use crate::config::Config;
use crate::error::ScoutError;
use crate::llm::{self, LlmBackend};
use crate::models::{FilledQuery, ParsedTable, QueryTemplate, Selection};
use crate::search::{self, RateLimiter, SearchBackend};
use crate::table;
use crate::template;

/// Template plus the per-row filled queries, before any searching.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub template: QueryTemplate,
    pub column_names: Vec<String>,
    pub row_queries: Vec<RowQuery>,
}

/// One row's filled query and its structured values.
#[derive(Debug, Clone)]
pub struct RowQuery {
    /// Zero-based index of the row in the source table.
    pub row_index: usize,
    pub query: FilledQuery,
    pub row_values: BTreeMap<String, String>,
}

/// Summary of a completed research run.
#[derive(Debug)]
pub struct ResearchOutcome {
    /// Scope id for looking up per-row records in the aggregator.
    pub scope: Uuid,
    pub template: QueryTemplate,
    /// Rows whose retrieval completed and was recorded.
    pub rows_searched: usize,
    /// Rows skipped because the request was cancelled before they started.
    pub rows_skipped: usize,
    /// Rows whose search failed; the others completed regardless.
    pub row_failures: Vec<RowFailure>,
}

#[derive(Debug)]
pub struct RowFailure {
    pub row_index: usize,
    pub error: ScoutError,
}

/// Select data, generate the request's single template, and fill it for
/// every selected row. No searching; pure after the one LLM call.
pub async fn analyze(
    llm: &dyn LlmBackend,
    table: &ParsedTable,
    selection: &Selection,
    why_fields: &str,
    what_result: &str,
) -> Result<AnalyzeOutcome, ScoutError> {
    let selected = table::select(table, selection)?;

    let template = llm::generate_template(llm, &selected.column_names, why_fields, what_result).await?;
    tracing::info!(
        template = %template.text,
        fallback = template.is_fallback(),
        rows = selected.rows.len(),
        columns = selected.column_names.len(),
        "query template ready"
    );

    let intent_keywords = format!("{why_fields} {what_result}").trim().to_string();

    let row_queries = selected
        .rows
        .iter()
        .map(|row| RowQuery {
            row_index: row.index,
            query: template::fill_template(
                &template,
                &selected.column_names,
                &row.values,
                &intent_keywords,
            ),
            row_values: row.value_map(&selected.column_names),
        })
        .collect();

    Ok(AnalyzeOutcome {
        template,
        column_names: selected.column_names,
        row_queries,
    })
}

/// Run a full research request: analyze, then search every row concurrently
/// and record the per-row results under a fresh scope id.
///
/// Row searches run on a pool of `pipeline.workers` tasks sharing one
/// rate-limit budget. Cancellation stops further page fetches promptly;
/// rows with partial results are still recorded.
#[allow(clippy::too_many_arguments)]
pub async fn research(
    llm: &dyn LlmBackend,
    search_backend: Arc<dyn SearchBackend>,
    aggregator: Arc<ResultAggregator>,
    config: &Config,
    table: &ParsedTable,
    selection: &Selection,
    why_fields: &str,
    what_result: &str,
    cancel: CancellationToken,
) -> Result<ResearchOutcome, ScoutError> {
    let analysis = analyze(llm, table, selection, why_fields, what_result).await?;
    let scope = Uuid::new_v4();

    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
        config.search.page_delay_ms,
    )));
    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers));

    enum RowTask {
        Completed(usize),
        Skipped(usize),
        Failed(usize, ScoutError),
    }

    let mut tasks: JoinSet<RowTask> = JoinSet::new();
    for row in analysis.row_queries.iter().cloned() {
        let backend = Arc::clone(&search_backend);
        let aggregator = Arc::clone(&aggregator);
        let limiter = Arc::clone(&limiter);
        let semaphore = Arc::clone(&semaphore);
        let search_config = config.search.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return RowTask::Skipped(row.row_index),
            };
            if cancel.is_cancelled() {
                return RowTask::Skipped(row.row_index);
            }

            match search::run_search(
                backend.as_ref(),
                &limiter,
                &search_config,
                &row.query.text,
                &cancel,
            )
            .await
            {
                Ok(outcome) => {
                    aggregator.record(
                        scope,
                        row.row_index,
                        row.query.text,
                        outcome.query_used,
                        row.row_values,
                        outcome.hits,
                    );
                    RowTask::Completed(row.row_index)
                }
                Err(error) => RowTask::Failed(row.row_index, error),
            }
        });
    }

    let mut rows_searched = 0;
    let mut rows_skipped = 0;
    let mut row_failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(RowTask::Completed(_)) => rows_searched += 1,
            Ok(RowTask::Skipped(_)) => rows_skipped += 1,
            Ok(RowTask::Failed(row_index, error)) => {
                tracing::warn!(row_index, %error, "row search failed");
                row_failures.push(RowFailure { row_index, error });
            }
            Err(join_error) => {
                tracing::error!(%join_error, "row search task aborted");
            }
        }
    }

    row_failures.sort_by_key(|f| f.row_index);

    Ok(ResearchOutcome {
        scope,
        template: analysis.template,
        rows_searched,
        rows_skipped,
        row_failures,
    })
}
