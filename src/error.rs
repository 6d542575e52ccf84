//! Error taxonomy for the research pipeline.
//!
//! Every failure in the core pipeline is local and single-attempt: nothing in
//! this crate retries a network call. Callers decide whether to resubmit a
//! whole request or a single row, so each variant carries enough detail to
//! make that call.

use thiserror::Error;

/// Failures surfaced by the research pipeline.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// The selection references no usable tabular data.
    #[error("no tabular data: {0}")]
    Input(String),

    /// LLM endpoint unreachable, timed out, or returned non-2xx.
    ///
    /// Retryable by resubmitting the request; the pipeline never silently
    /// substitutes a template for an unreachable model.
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// Search provider API key is absent. No network call was made.
    #[error("search provider not configured: set {0} to enable web search")]
    SearchNotConfigured(String),

    /// Search provider answered with a non-2xx status.
    #[error("search provider error {status}: {body}")]
    SearchProvider { status: u16, body: String },

    /// Network failure or timeout while talking to the search provider.
    #[error("search transport error: {0}")]
    SearchTransport(String),
}
