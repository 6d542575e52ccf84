//! Query template extraction and filling.
//!
//! LLM completions are noisy: conversational filler, multi-line prose,
//! JSON-shaped refusals. [`extract_template`] distills a raw response into a
//! single usable query line with `[ColumnName]` placeholders, and
//! [`fill_template`] substitutes one row's values into it. Both are pure
//! functions; the network side lives in [`crate::llm`].
//!
//! Extraction failure is not an error here: the pipeline's single, consistent
//! policy is to substitute the deterministic [`fallback_template`] (the
//! space-joined placeholders for all selected columns), tagged with
//! [`TemplateProvenance::PlaceholderFallback`] so callers can observe it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{FilledQuery, QueryTemplate, TemplateProvenance};

/// Filled queries shorter than this are discarded in favor of the
/// keyword+value concatenation fallback.
pub const MIN_QUERY_LEN: usize = 10;

/// Length cap for the text after a `Query: ...` colon candidate.
const AFTER_COLON_MAX: usize = 100;

/// Length cap for a bare-line candidate.
const LINE_MAX: usize = 150;

/// Conversational filler prefixes, stripped in order until none match.
///
/// The ordering is deterministic and observable: longer phrase patterns come
/// before the generic `query:`/`search:` prefix so they are not truncated
/// mid-phrase. Each pattern is anchored at the start of the text.
static FILLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(?:Sure!?|Okay!?|Certainly!?)\s*",
        r"(?i)^(?:Based on (?:the )?information provided,?\s*)?(?:here is|here's) (?:a |the )?(?:short )?search query (?:that you can use|below):?\s*",
        r"(?i)^You can use (?:the )?following (?:search )?query:?\s*",
        r"(?i)^The (?:search )?query (?:is|would be):?\s*",
        r"(?i)^[^\[\w]*(?:query|search):\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("filler pattern must compile"))
    .collect()
});

/// Matches any remaining `[Placeholder]` token after substitution.
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\w[^\]]*\]").expect("placeholder pattern must compile"));

/// Trim whitespace and wrap-around quote pairs.
///
/// Only a matched leading/trailing pair of the same quote character is
/// stripped, so a template that merely *starts* with a quoted keyword
/// (`"price" [Part Name]`) keeps its quotes.
fn trim_quotes(s: &str) -> &str {
    let mut text = s.trim();
    while text.len() >= 2 {
        let bytes = text.as_bytes();
        let (first, last) = (bytes[0], bytes[text.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            text = text[1..text.len() - 1].trim();
        } else {
            break;
        }
    }
    text
}

fn has_braces(s: &str) -> bool {
    s.contains('{') || s.contains('}')
}

/// Strip filler prefixes repeatedly until no pattern matches.
fn strip_filler(text: &str) -> String {
    let mut text = text.trim().to_string();
    loop {
        let mut changed = false;
        for pattern in FILLER_PATTERNS.iter() {
            if let Some(m) = pattern.find(&text) {
                if m.start() == 0 && !m.is_empty() {
                    text = text[m.end()..].trim_start().to_string();
                    changed = true;
                }
            }
        }
        if !changed {
            return text;
        }
    }
}

/// Distill a raw LLM response into a single query-template line.
///
/// Returns `None` when no usable line exists: empty input, JSON-shaped
/// output, or nothing under the length caps. Candidate priority:
/// 1. the first line containing `[` and `]` (and no braces);
/// 2. the first line with a `:` whose tail is non-empty and short enough;
/// 3. the first sufficiently short line.
///
/// Every candidate is rejected if it contains `{`/`}`, so a returned
/// template always satisfies the no-braces invariant.
pub fn extract_template(raw: &str) -> Option<String> {
    let text = trim_quotes(raw);
    if text.is_empty() {
        return None;
    }
    // JSON-shaped output is never a query
    if text.starts_with('{') && text.contains('}') {
        return None;
    }
    let text = strip_filler(text);

    let lines: Vec<&str> = text
        .lines()
        .map(trim_quotes)
        .filter(|l| !l.is_empty())
        .collect();

    for line in &lines {
        if line.contains('[') && line.contains(']') && !has_braces(line) {
            return Some((*line).to_string());
        }
    }

    for line in &lines {
        if has_braces(line) {
            continue;
        }
        if let Some(idx) = line.find(':') {
            let after = trim_quotes(&line[idx + 1..]);
            if !after.is_empty() && after.chars().count() < AFTER_COLON_MAX {
                return Some(after.to_string());
            }
        }
    }

    lines
        .iter()
        .find(|l| !has_braces(l) && l.chars().count() < LINE_MAX)
        .map(|l| (*l).to_string())
}

/// The deterministic placeholder-only fallback: `[Col A] [Col B] ...`.
///
/// Guarantees the pipeline can proceed with at least the selected columns
/// as search terms when extraction yields nothing.
pub fn fallback_template(column_names: &[String]) -> QueryTemplate {
    let text = column_names
        .iter()
        .map(|c| format!("[{c}]"))
        .collect::<Vec<_>>()
        .join(" ");
    QueryTemplate {
        text,
        provenance: TemplateProvenance::PlaceholderFallback,
    }
}

/// Wrap an extracted line as a generated template.
pub fn generated_template(text: String) -> QueryTemplate {
    QueryTemplate {
        text,
        provenance: TemplateProvenance::Generated,
    }
}

/// Substitute one row's values into a template.
///
/// Each `[column]` placeholder becomes the trimmed value in double quotes;
/// an empty value makes the placeholder vanish together with its quotes.
/// Unresolved or mistyped placeholders are removed, whitespace is collapsed
/// to single spaces, and a result shorter than [`MIN_QUERY_LEN`] is replaced
/// by the intent keywords (each token quoted) followed by all non-empty row
/// values (each quoted). Pure function of its inputs.
pub fn fill_template(
    template: &QueryTemplate,
    column_names: &[String],
    row_values: &[String],
    intent_keywords: &str,
) -> FilledQuery {
    let mut result = template.text.clone();
    for (column, value) in column_names.iter().zip(row_values.iter()) {
        let placeholder = format!("[{column}]");
        let trimmed = value.trim();
        let quoted = if trimmed.is_empty() {
            String::new()
        } else {
            format!("\"{trimmed}\"")
        };
        result = result.replace(&placeholder, &quoted);
    }

    let stripped = PLACEHOLDER_RE.replace_all(&result, "");
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.chars().count() >= MIN_QUERY_LEN {
        return FilledQuery { text: normalized };
    }

    let mut parts: Vec<String> = intent_keywords
        .split_whitespace()
        .map(|token| format!("\"{token}\""))
        .collect();
    parts.extend(
        row_values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| format!("\"{v}\"")),
    );
    FilledQuery {
        text: parts.join(" "),
    }
}
