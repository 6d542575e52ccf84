//! LLM backend abstraction and the Ollama implementation.
//!
//! Defines the [`LlmBackend`] trait and the concrete [`OllamaClient`], which
//! calls a local Ollama-compatible completion endpoint. The single entry
//! point for the pipeline is [`generate_template`]: one prompt, one attempt,
//! one [`QueryTemplate`] out.
//!
//! # Failure behavior
//!
//! - Endpoint unreachable / timed out / non-2xx → [`ScoutError::LlmUnavailable`].
//!   Never retried here; resubmitting the request is the caller's decision.
//! - Endpoint reachable but no usable template line in the response → the
//!   deterministic placeholder-only fallback template (see [`crate::template`]).
//!   This is the crate's one consistent extraction-failure policy; the
//!   provenance tag on the returned template records that it happened.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::ScoutError;
use crate::models::QueryTemplate;
use crate::template;

/// Trait for LLM completion backends.
///
/// Implementations perform exactly one completion call per invocation; any
/// retry policy belongs to callers. In-process fakes implement this for
/// tests.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, ScoutError>;
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
///
/// Sends `{model, prompt, stream: false, system}` and reads the `response`
/// field of the reply. Constructed from configuration and injected where
/// needed; there is no shared global client.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ScoutError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::LlmUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, ScoutError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "system": system,
        });

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ScoutError::LlmUnavailable(format!(
                    "{e}. Ensure the model server is running and the model is loaded."
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ScoutError::LlmUnavailable(format!(
                "endpoint returned {status}: {body_text}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::LlmUnavailable(format!("invalid response body: {e}")))?;

        Ok(json
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Generate the request's query template: one prompt, one completion call,
/// then extraction with the placeholder fallback on failure.
pub async fn generate_template(
    llm: &dyn LlmBackend,
    column_names: &[String],
    why_fields: &str,
    what_result: &str,
) -> Result<QueryTemplate, ScoutError> {
    let prompt = build_prompt(column_names, why_fields, what_result);
    let raw = llm.complete(&prompt, SYSTEM_PROMPT).await?;

    match template::extract_template(&raw) {
        Some(line) => Ok(template::generated_template(line)),
        None => {
            tracing::warn!(
                response_len = raw.len(),
                "no usable template line in LLM response; using placeholder fallback"
            );
            Ok(template::fallback_template(column_names))
        }
    }
}

const SYSTEM_PROMPT: &str = "You output a search query TEMPLATE with [ColumnName] placeholders. \
Each placeholder will be replaced with the actual row value (e.g. [Part Name] -> 'Siemens Circuit Breaker'). \
The final query has values in quotes, not headers. Output only the template.";

/// Build the one-shot template prompt from the selected columns and intent.
fn build_prompt(column_names: &[String], why_fields: &str, what_result: &str) -> String {
    let columns_str = column_names.join(", ");
    let placeholders_example = column_names
        .iter()
        .map(|c| format!("[{c}]"))
        .collect::<Vec<_>>()
        .join(" ");
    let why = if why_fields.trim().is_empty() {
        "Not specified"
    } else {
        why_fields
    };
    let what = if what_result.trim().is_empty() {
        "Not specified"
    } else {
        what_result
    };

    format!(
        r#"ANALYZE the user's requirement and the selected fields. Then output ONE web search query TEMPLATE.

IMPORTANT: You output a TEMPLATE with [ColumnName] placeholders. The system will replace each [ColumnName] with the actual ROW VALUE (e.g. [Part Name] becomes "NTN Tapered Roller Bearing", [Manufacturer Part] becomes "4T-30205"). The final search query will have VALUES in quotes, NOT column headers. Never put "Part Name" or headers as literal text - only [ColumnName] format.

STEP 1 - ANALYZE:
- User's requirement: {why}
- User's desired result: {what}
- Selected fields (use as [ColumnName] placeholders): {columns_str}

STEP 2 - BUILD THE TEMPLATE:
Include: (1) search terms from user intent in "quotes", (2) each column as [ColumnName] so it gets replaced with actual values.
Example: "alternative suppliers" "price" "vendor" {placeholders_example}

Output ONLY the template, nothing else:"#
    )
}
