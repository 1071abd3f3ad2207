//! pubmend - add, update and sort pubspec dependencies from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pubmend_core::assist::{sort_manifest, Assistant, BatchReport, PackageOutcome};
use pubmend_core::catalog::Catalog;
use pubmend_core::document::{DocumentSource, ManifestFile};
use pubmend_core::manifest::DependencyType;
use pubmend_core::search::SearchResult;
use pubmend_core::settings::Settings;

mod prompt;

use prompt::TerminalPrompt;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "pubmend",
    about = "Add, update and sort dependencies in a Dart or Flutter pubspec",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Pubspec to edit (default: pubspec.yaml or pubspec.yml in the current directory)
    #[clap(long, short = 'f', global = true)]
    file: Option<PathBuf>,

    /// Settings file (default: platform config directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Package catalog API base URL
    #[clap(long, global = true)]
    api_url: Option<String>,

    /// Write exact versions instead of ^version
    #[clap(long, global = true)]
    no_caret: bool,

    /// Sort dependency blocks after editing
    #[clap(long, global = true)]
    sort: bool,

    /// Group sorted entries by source (sdk, path, git, hosted)
    #[clap(long, global = true)]
    legacy_sort: bool,

    /// Use the line-based merge (works on files with YAML errors)
    #[clap(long, global = true)]
    legacy_parser: bool,

    /// Always ask which package to use when several match
    #[clap(long, global = true)]
    no_auto_add: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add one or more packages (comma-separated); asks when no query is given
    Add {
        query: Option<String>,

        /// Add to dev_dependencies
        #[clap(long)]
        dev: bool,
    },

    /// Update every package of a block to its latest version
    Update {
        /// Update dev_dependencies
        #[clap(long)]
        dev: bool,
    },

    /// Sort all dependency blocks
    Sort,

    /// Show ranked catalog matches for a query
    Search {
        query: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

/// Initialize tracing with CLI flags
///
/// `RUST_LOG` directives are added on top of --log-level.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());
    if let Ok(env) = std::env::var("RUST_LOG") {
        for directive in env.split(',').filter_map(|d| d.parse().ok()) {
            filter = filter.add_directive(directive);
        }
    }

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let settings = load_settings(&cli)?;
    debug!("Effective settings: {:?}", settings);

    match &cli.command {
        Command::Add { query, dev } => {
            let catalog = catalog_client(cli.api_url.as_deref())?;
            let mut manifest = open_manifest(&cli)?;
            let report = Assistant::new(catalog.as_ref(), &settings)
                .add_dependencies(&mut manifest, &TerminalPrompt, block(*dev), query.as_deref())
                .await?;
            print_report(&report, &manifest);
        }
        Command::Update { dev } => {
            let catalog = catalog_client(cli.api_url.as_deref())?;
            let mut manifest = open_manifest(&cli)?;
            let report = Assistant::new(catalog.as_ref(), &settings)
                .update_all(&mut manifest, &TerminalPrompt, block(*dev))
                .await?;
            print_report(&report, &manifest);
        }
        Command::Sort => {
            let mut manifest = open_manifest(&cli)?;
            if sort_manifest(&mut manifest, &settings)? {
                println!("Sorted dependencies in {}.", manifest.describe());
            } else {
                println!("{} is already sorted.", manifest.describe());
            }
        }
        Command::Search { query, json } => {
            let catalog = catalog_client(cli.api_url.as_deref())?;
            let result = Assistant::new(catalog.as_ref(), &settings)
                .search(&TerminalPrompt, query)
                .await?;
            print_search(query, &result, *json)?;
        }
    }

    Ok(())
}

fn block(dev: bool) -> DependencyType {
    if dev {
        DependencyType::Dev
    } else {
        DependencyType::Regular
    }
}

/// Settings file plus command-line overrides
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load()?,
    };

    if cli.no_caret {
        settings.use_caret_syntax = false;
    }
    if cli.sort {
        settings.sort_dependencies = true;
    }
    if cli.legacy_sort {
        settings.use_legacy_sorting = true;
    }
    if cli.legacy_parser {
        settings.use_legacy_parser = true;
    }
    if cli.no_auto_add {
        settings.auto_add_package = false;
    }

    Ok(settings)
}

fn open_manifest(cli: &Cli) -> Result<ManifestFile> {
    match &cli.file {
        Some(path) => Ok(ManifestFile::new(path)),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Ok(ManifestFile::discover(&cwd)?)
        }
    }
}

#[cfg(feature = "catalog")]
fn catalog_client(api_url: Option<&str>) -> Result<Box<dyn Catalog>> {
    use pubmend_core::catalog::{PubApi, DEFAULT_API_URL};

    Ok(Box::new(PubApi::with_base_url(
        api_url.unwrap_or(DEFAULT_API_URL),
    )?))
}

#[cfg(not(feature = "catalog"))]
fn catalog_client(_api_url: Option<&str>) -> Result<Box<dyn Catalog>> {
    anyhow::bail!("pubmend was built without the `catalog` feature; package lookups are unavailable")
}

fn print_report(report: &BatchReport, manifest: &dyn DocumentSource) {
    for outcome in &report.outcomes {
        match outcome {
            PackageOutcome::Merged { package, insertion } => {
                println!(
                    "{} '{}' (version {}).",
                    insertion, package.name, package.latest_version
                );
            }
            PackageOutcome::NotFound { query } => {
                println!("Package '{query}' not found.");
            }
            PackageOutcome::Ambiguous { query, candidates } => {
                println!(
                    "Skipped '{}': {} packages match ({}).",
                    query,
                    candidates.len(),
                    candidates.join(", ")
                );
            }
            PackageOutcome::Cancelled { query } => {
                println!("Skipped '{query}'.");
            }
            PackageOutcome::Failed { query, reason } => {
                println!("Could not add '{query}': {reason}");
            }
            PackageOutcome::Pinned { query, source } => {
                println!("Kept '{query}': it comes from a {source} source.");
            }
        }
    }

    if report.written {
        let sorted = if report.sorted { " and sorted" } else { "" };
        println!("Updated {}{}.", manifest.describe(), sorted);
    } else {
        println!("No changes made to {}.", manifest.describe());
    }
}

/// Table row for search results
#[derive(Tabled)]
struct SearchRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Score")]
    score: String,
}

fn print_search(query: &str, result: &SearchResult, json: bool) -> Result<()> {
    let candidates = match result {
        SearchResult::Resolved(candidate) => std::slice::from_ref(candidate),
        SearchResult::Candidates(candidates) => candidates.as_slice(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(candidates)?);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No packages match '{query}'.");
        return Ok(());
    }

    let rows: Vec<SearchRow> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| SearchRow {
            rank: index + 1,
            name: candidate.name.clone(),
            score: format!("{:.3}", candidate.score),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = temp_dir.path().join("settings.yaml");
        std::fs::write(&config, "sortDependencies: false\nuseCaretSyntax: true\n").unwrap();

        let cli = Cli::parse_from([
            "pubmend",
            "--config",
            config.to_str().unwrap(),
            "--no-caret",
            "--sort",
            "add",
            "http",
            "--dev",
        ]);
        let settings = load_settings(&cli).unwrap();

        assert!(!settings.use_caret_syntax);
        assert!(settings.sort_dependencies);
        assert!(settings.auto_add_package);
        assert!(matches!(cli.command, Command::Add { dev: true, .. }));
    }

    #[test]
    fn test_explicit_file_is_used() {
        let cli = Cli::parse_from(["pubmend", "sort", "--file", "/tmp/app/pubspec.yaml"]);
        let manifest = open_manifest(&cli).unwrap();
        assert_eq!(manifest.describe(), "/tmp/app/pubspec.yaml");
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from(["pubmend", "search", "http"]);
        assert!(matches!(cli.command, Command::Search { ref query, json: false } if query == "http"));
    }
}
