//! # Table Scout CLI (`tscout`)
//!
//! The `tscout` binary drives the research pipeline from a local CSV file.
//!
//! ## Usage
//!
//! ```bash
//! tscout --config ./config/tscout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tscout providers` | Show LLM endpoint and search provider configuration status |
//! | `tscout analyze <file.csv>` | Generate the query template and per-row filled queries (no searching) |
//! | `tscout research <file.csv>` | Run the full pipeline and print per-row result summaries |
//!
//! ## Examples
//!
//! ```bash
//! # Check what is configured before burning API credit
//! tscout providers
//!
//! # Template + filled queries for two explicit rows and columns
//! tscout analyze parts.csv --rows 0,2 --columns 0,3 \
//!     --why "alternative suppliers" --what "vendor list with prices"
//!
//! # Research the first 20 rows across all columns
//! tscout research parts.csv --max-rows 20 --why "price" --what "datasheet"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use table_scout::aggregate::ResultAggregator;
use table_scout::config::{self, Config};
use table_scout::llm::OllamaClient;
use table_scout::loader;
use table_scout::models::{Pick, Selection};
use table_scout::pipeline;
use table_scout::search::SerperClient;

/// Table Scout — a spreadsheet-driven web research pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; built-in defaults are used when the file does not exist.
#[derive(Parser)]
#[command(
    name = "tscout",
    about = "Table Scout — per-row web research queries from a single LLM template",
    version,
    long_about = "Table Scout takes a CSV file, a row/column selection, and a two-part intent, \
    generates one search-query template via a local LLM, fills it per row, and retrieves \
    paginated web search results for every selected row."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tscout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Show provider configuration status.
    ///
    /// Reports the LLM endpoint and model, the search endpoint, and whether
    /// the search API key environment variable is set. No network calls.
    Providers,

    /// Generate the query template and per-row filled queries.
    ///
    /// Runs selection and template generation (one LLM call), then prints
    /// the template and every row's filled query without searching.
    Analyze {
        /// CSV file with a header row.
        file: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        intent: IntentArgs,
    },

    /// Run the full research pipeline.
    ///
    /// Generates the template, fills it per row, searches every row with
    /// bounded concurrency, and prints per-row result summaries. Ctrl-C
    /// cancels in-flight retrieval; rows finished before cancellation are
    /// still reported.
    Research {
        /// CSV file with a header row.
        file: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        intent: IntentArgs,
    },
}

#[derive(clap::Args)]
struct SelectionArgs {
    /// Zero-based row indices (comma-separated). Out-of-range indices are
    /// dropped; empty means all rows.
    #[arg(long, value_delimiter = ',')]
    rows: Vec<usize>,

    /// Zero-based column indices (comma-separated). Out-of-range indices
    /// are dropped; empty means all columns.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<usize>,

    /// Use only the first N rows (ignored when --rows is given).
    #[arg(long)]
    max_rows: Option<usize>,

    /// Use only the first N columns (ignored when --columns is given).
    #[arg(long)]
    max_columns: Option<usize>,
}

#[derive(clap::Args)]
struct IntentArgs {
    /// Why these fields were selected.
    #[arg(long, default_value = "")]
    why: String,

    /// What result the research should produce.
    #[arg(long, default_value = "")]
    what: String,
}

impl SelectionArgs {
    fn to_selection(&self) -> Selection {
        let rows = if !self.rows.is_empty() {
            Pick::Indices(self.rows.clone())
        } else if let Some(n) = self.max_rows {
            Pick::Head(n)
        } else {
            Pick::All
        };
        let columns = if !self.columns.is_empty() {
            Pick::Indices(self.columns.clone())
        } else if let Some(n) = self.max_columns {
            Pick::Head(n)
        } else {
            Pick::All
        };
        Selection { rows, columns }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Providers => cmd_providers(&config),
        Commands::Analyze {
            file,
            selection,
            intent,
        } => cmd_analyze(&config, &file, &selection, &intent).await,
        Commands::Research {
            file,
            selection,
            intent,
        } => cmd_research(&config, &file, &selection, &intent).await,
    }
}

fn cmd_providers(config: &Config) -> Result<()> {
    println!("providers");
    println!(
        "  llm: {} (model: {}, timeout: {}s)",
        config.llm.base_url, config.llm.model, config.llm.timeout_secs
    );
    println!("  search: {}", config.search.endpoint);
    let key_set = std::env::var(&config.search.api_key_env)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    println!(
        "    api key ({}): {}",
        config.search.api_key_env,
        if key_set { "configured" } else { "MISSING" }
    );
    println!(
        "    page size: {}, max pages: {}, page delay: {}ms",
        config.search.page_size, config.search.max_pages, config.search.page_delay_ms
    );
    println!("  pipeline workers: {}", config.pipeline.workers);
    Ok(())
}

async fn cmd_analyze(
    config: &Config,
    file: &Path,
    selection: &SelectionArgs,
    intent: &IntentArgs,
) -> Result<()> {
    let table = loader::load_table(file)?;
    let llm = OllamaClient::new(&config.llm)?;

    let outcome = pipeline::analyze(
        &llm,
        &table,
        &selection.to_selection(),
        &intent.why,
        &intent.what,
    )
    .await?;

    println!("analyze {}", file.display());
    println!("  template: {}", outcome.template.text);
    if outcome.template.is_fallback() {
        println!("  (no usable template in LLM response; placeholder fallback in use)");
    }
    println!("  columns: {}", outcome.column_names.join(", "));
    println!("  rows: {}", outcome.row_queries.len());
    println!();

    for row in &outcome.row_queries {
        println!("row {}", row.row_index);
        println!("  query: {}", row.query.text);
    }
    println!("ok");
    Ok(())
}

async fn cmd_research(
    config: &Config,
    file: &Path,
    selection: &SelectionArgs,
    intent: &IntentArgs,
) -> Result<()> {
    let table = loader::load_table(file)?;
    let llm = OllamaClient::new(&config.llm)?;
    let search = Arc::new(SerperClient::new(&config.search)?);
    let aggregator = Arc::new(ResultAggregator::new());

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling; finished rows will still be reported");
            signal_cancel.cancel();
        }
    });

    let outcome = pipeline::research(
        &llm,
        search,
        Arc::clone(&aggregator),
        config,
        &table,
        &selection.to_selection(),
        &intent.why,
        &intent.what,
        cancel,
    )
    .await?;

    println!("research {}", file.display());
    println!("  template: {}", outcome.template.text);
    if outcome.template.is_fallback() {
        println!("  (no usable template in LLM response; placeholder fallback in use)");
    }
    println!(
        "  rows searched: {}, failed: {}, skipped: {}",
        outcome.rows_searched,
        outcome.row_failures.len(),
        outcome.rows_skipped
    );
    println!();

    for (i, result) in aggregator.list_results(outcome.scope).iter().enumerate() {
        println!(
            "{}. row {} — {} hits",
            i + 1,
            result.row_index,
            result.hit_count()
        );
        println!("    query: {}", result.query_text);
        println!("    used: {}", result.query_used);
        if let Some(top) = result.results.first() {
            println!(
                "    top: {} — {}",
                top.title().unwrap_or("(untitled)"),
                top.link().unwrap_or("(no link)")
            );
        }
        println!();
    }

    if !outcome.row_failures.is_empty() {
        println!("failures:");
        for failure in &outcome.row_failures {
            println!("  row {}: {}", failure.row_index, failure.error);
        }
    }
    println!("ok");
    Ok(())
}
