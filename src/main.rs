//! CLI entry point for the document index.
//!
//! Commands mirror the index operations: add, update, remove, search,
//! similar, import, reindex, stats. `--json` switches every command to the
//! JSON envelope in `lexvec::io`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use lexvec::display::{create_failures_table, create_results_table, create_stats_table};
use lexvec::io::{ExitCode, OutputFormat, OutputManager};
use lexvec::{DocumentMetadata, IndexError, Settings, SourceDocument, VectorService};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "lexvec",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over legal documents",
    long_about = "Embed documents into a flat vector index and search them by similarity.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .lexvec directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Add a new document to the index")]
    Add(DocumentArgs),

    #[command(about = "Replace a document's text and metadata (adds it if missing)")]
    Update(DocumentArgs),

    #[command(about = "Remove a document from search results")]
    Remove {
        /// Document id
        id: String,
    },

    #[command(
        about = "Search documents by meaning",
        after_help = "Examples:\n  lexvec search \"breach of fiduciary duty\"\n  lexvec search \"adverse possession\" --limit 5 --threshold 0.3 --json"
    )]
    Search {
        query: String,

        /// Maximum number of results (defaults to search.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (defaults to search.threshold)
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f32>,
    },

    #[command(about = "Find documents similar to an indexed document")]
    Similar {
        /// Document id
        id: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    #[command(about = "Add every document in a JSON file, skipping ones that fail")]
    Import {
        /// JSON array of {id, content, title?, type?, jurisdiction?, date?, citations?, tags?}
        path: PathBuf,
    },

    #[command(
        about = "Rebuild the index from a JSON file, reclaiming removed slots",
        long_about = "Rebuild the index from the authoritative document list. The current index stays live until the rebuild succeeds; Ctrl-C cancels without changing it."
    )]
    Reindex {
        /// JSON array of {id, content, title?, type?, jurisdiction?, date?, citations?, tags?}
        path: PathBuf,
    },

    #[command(about = "Show index counters")]
    Stats,

    #[command(about = "Display active settings")]
    Config,
}

#[derive(Args)]
struct DocumentArgs {
    /// Document id
    id: String,

    /// Document text (read from --file or stdin when omitted)
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Read document text from a file
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long)]
    title: Option<String>,

    /// Document type, e.g. case_law or statute
    #[arg(long = "type")]
    doc_type: Option<String>,

    #[arg(long)]
    jurisdiction: Option<String>,

    /// Date as YYYY-MM-DD
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Citation string (repeatable)
    #[arg(long = "citation")]
    citations: Vec<String>,

    /// Extra attribute as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

impl DocumentArgs {
    fn content(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
        std::io::read_to_string(std::io::stdin()).context("failed to read document text from stdin")
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: self.title.clone().unwrap_or_default(),
            doc_type: self.doc_type.clone().unwrap_or_default(),
            jurisdiction: self.jurisdiction.clone().unwrap_or_default(),
            date: self.date,
            citations: self.citations.clone(),
            tags: self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[derive(Serialize)]
struct DocumentOutcome<'a> {
    document_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    slot: Option<u32>,
}

fn load_documents(path: &Path) -> Result<Vec<SourceDocument>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON array of documents", path.display()))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file {} does not exist", path.display());
            }
            Settings::load_from(path)
                .with_context(|| format!("configuration error in {}", path.display()))?
        }
        None => Settings::load().context("configuration error")?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut output = OutputManager::new(OutputFormat::from_json_flag(cli.json));

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            let err = IndexError::Config {
                reason: format!("{e:#}"),
            };
            let code = output.error(&err).unwrap_or(ExitCode::ConfigError);
            std::process::exit(code.into());
        }
    };
    lexvec::logging::init(&settings);

    let code = match run(cli.command, settings, &mut output).await {
        Ok(code) => code,
        Err(e) => {
            let reported = match e.downcast_ref::<IndexError>() {
                Some(index_error) => output.error(index_error),
                None => output.error(&IndexError::General(format!("{e:#}"))),
            };
            reported.unwrap_or(ExitCode::GeneralError)
        }
    };
    std::process::exit(code.into());
}

async fn run(command: Commands, settings: Settings, output: &mut OutputManager) -> Result<ExitCode> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| IndexError::Config {
                    reason: e.to_string(),
                })?;
            let text = format!(
                "Created configuration file at: {}\nEdit this file to customize your settings.",
                path.display()
            );
            return Ok(output.success(&path, &text)?);
        }
        Commands::Config => {
            let text = toml::to_string_pretty(&settings)?;
            return Ok(output.success(&settings, &text)?);
        }
        _ => {}
    }

    let service = VectorService::init(settings).await?;
    let code = match command {
        Commands::Add(args) => {
            let slot = service
                .add_document(&args.id, args.content()?, args.metadata())
                .await?;
            let outcome = DocumentOutcome {
                document_id: &args.id,
                slot: Some(slot.get()),
            };
            output.success(&outcome, &format!("Added '{}' at slot {slot}", args.id))?
        }
        Commands::Update(args) => {
            let slot = service
                .update_document(&args.id, args.content()?, args.metadata())
                .await?;
            let outcome = DocumentOutcome {
                document_id: &args.id,
                slot: Some(slot.get()),
            };
            output.success(&outcome, &format!("Updated '{}', now at slot {slot}", args.id))?
        }
        Commands::Remove { id } => {
            service.remove_document(&id).await?;
            let outcome = DocumentOutcome {
                document_id: &id,
                slot: None,
            };
            output.success(&outcome, &format!("Removed '{id}'"))?
        }
        Commands::Search {
            query,
            limit,
            threshold,
        } => {
            let results = service.similarity_search(query, limit, threshold).await?;
            let text = if results.is_empty() {
                "No documents matched".to_string()
            } else {
                create_results_table(&results)
            };
            output.success(&results, &text)?
        }
        Commands::Similar { id, limit } => {
            let results = service.find_similar_to_document(id, limit).await?;
            let text = if results.is_empty() {
                "No similar documents".to_string()
            } else {
                create_results_table(&results)
            };
            output.success(&results, &text)?
        }
        Commands::Import { path } => {
            let documents = load_documents(&path)?;
            output.progress(&format!("Importing {} documents...", documents.len()))?;
            let report = service.add_documents(documents).await?;
            let mut text = format!(
                "Added {} documents, {} failed",
                report.added.len(),
                report.failed.len()
            );
            let failures = create_failures_table(&report);
            if !failures.is_empty() {
                text.push('\n');
                text.push_str(&failures);
            }
            output.success(&report, &text)?
        }
        Commands::Reindex { path } => {
            let documents = load_documents(&path)?;
            output.progress(&format!("Reindexing {} documents...", documents.len()))?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling reindex");
                    on_interrupt.cancel();
                }
            });
            let result = service.reindex_all_with_cancel(documents, cancel).await;
            watcher.abort();

            let report = result?;
            let text = format!(
                "Reindexed {} documents, reclaimed {} removed slots",
                report.documents, report.reclaimed
            );
            output.success(&report, &text)?
        }
        Commands::Stats => {
            let stats = service.stats().await?;
            output.success(&stats, &create_stats_table(&stats))?
        }
        Commands::Init { .. } | Commands::Config => ExitCode::Success,
    };

    service.teardown().await?;
    Ok(code)
}
