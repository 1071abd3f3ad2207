//! Add, update and sort flows
//!
//! Each flow reads the manifest once, resolves packages against the
//! catalog one query at a time, merges every resolved package into the
//! accumulated text, optionally sorts, and writes once. A failure to
//! resolve one package never stops the others; it is recorded in the
//! [`BatchReport`].

use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, LookupError, ResolvedPackage};
use crate::document::DocumentSource;
use crate::error::Result;
use crate::manifest::{self, DependencyType, InsertionMethod, MergeRequest};
use crate::search::{self, SearchResult};
use crate::settings::Settings;

/// Interaction with the person running the tool
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Free-text package query; several may be separated by commas
    async fn ask_query(&self, block: DependencyType) -> Option<String>;

    /// Pick one of the ranked candidate names
    async fn choose(&self, query: &str, options: &[String]) -> Option<String>;

    /// Whether to retry after the catalog stopped responding
    async fn offer_retry(&self, error: &LookupError) -> bool;
}

/// Split raw input into package queries
pub fn parse_queries(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|query| query.trim().to_lowercase())
        .filter(|query| !query.is_empty())
        .collect()
}

/// What happened to one query of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum PackageOutcome {
    /// Written into the manifest
    Merged {
        package: ResolvedPackage,
        insertion: InsertionMethod,
    },

    /// The catalog has nothing matching the query
    NotFound { query: String },

    /// Several candidates and nobody to choose between them
    Ambiguous { query: String, candidates: Vec<String> },

    /// The user dismissed the prompt
    Cancelled { query: String },

    /// The lookup failed for good
    Failed { query: String, reason: String },

    /// Taken from an sdk, path, git or custom-hosted source; left as written
    Pinned { query: String, source: String },
}

/// Result of a batch flow
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub block: DependencyType,
    pub outcomes: Vec<PackageOutcome>,
    /// Whether the blocks were sorted before writing
    pub sorted: bool,
    /// Whether the manifest was written
    pub written: bool,
}

impl BatchReport {
    fn new(block: DependencyType) -> Self {
        Self {
            block,
            outcomes: Vec::new(),
            sorted: false,
            written: false,
        }
    }

    /// Packages that made it into the manifest
    pub fn merged(&self) -> impl Iterator<Item = (&ResolvedPackage, InsertionMethod)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            PackageOutcome::Merged { package, insertion } => Some((package, *insertion)),
            _ => None,
        })
    }
}

/// Result of resolving one query
enum Resolution {
    Package(ResolvedPackage),
    Skipped(PackageOutcome),
}

/// Runs the flows with one catalog and one set of settings
pub struct Assistant<'a> {
    catalog: &'a dyn Catalog,
    settings: &'a Settings,
}

impl<'a> Assistant<'a> {
    pub fn new(catalog: &'a dyn Catalog, settings: &'a Settings) -> Self {
        Self { catalog, settings }
    }

    /// Resolve and add the packages named in `input` (or asked for)
    pub async fn add_dependencies(
        &self,
        source: &mut dyn DocumentSource,
        prompt: &dyn UserPrompt,
        block: DependencyType,
        input: Option<&str>,
    ) -> Result<BatchReport> {
        // Fail before asking anything when there is no manifest
        source.read()?;

        let mut report = BatchReport::new(block);

        let input = match input {
            Some(input) => input.to_string(),
            None => match prompt.ask_query(block).await {
                Some(input) => input,
                None => {
                    debug!("No package query given");
                    return Ok(report);
                }
            },
        };

        let mut resolved = Vec::new();
        for query in parse_queries(&input) {
            match self.resolve(&query, prompt, true).await {
                Resolution::Package(package) => resolved.push(package),
                Resolution::Skipped(outcome) => report.outcomes.push(outcome),
            }
        }

        self.apply(source, &mut report, resolved)?;
        Ok(report)
    }

    /// Move every package of a block to its latest version
    ///
    /// Runs without disambiguation: a name that does not resolve to a
    /// single candidate is reported and left alone. Entries that do not
    /// come from the catalog are never looked up.
    pub async fn update_all(
        &self,
        source: &mut dyn DocumentSource,
        prompt: &dyn UserPrompt,
        block: DependencyType,
    ) -> Result<BatchReport> {
        let document = source.read()?;
        let entries = manifest::dependency_sources(&document, block)?;
        info!("Updating {} packages in {}", entries.len(), block);

        let mut report = BatchReport::new(block);
        let mut resolved = Vec::new();
        for (name, pinned) in entries {
            if let Some(kind) = pinned {
                debug!("Keeping '{}'; it comes from a {} source", name, kind);
                report.outcomes.push(PackageOutcome::Pinned {
                    query: name,
                    source: kind.to_string(),
                });
                continue;
            }
            match self.resolve(&name, prompt, false).await {
                Resolution::Package(package) => resolved.push(package),
                Resolution::Skipped(outcome) => report.outcomes.push(outcome),
            }
        }

        self.apply(source, &mut report, resolved)?;
        Ok(report)
    }

    /// Sort every dependency block and write the result back
    pub fn sort_all(&self, source: &mut dyn DocumentSource) -> Result<bool> {
        sort_manifest(source, self.settings)
    }

    /// Ranked candidates for a query, never auto-resolved
    pub async fn search(
        &self,
        prompt: &dyn UserPrompt,
        query: &str,
    ) -> std::result::Result<SearchResult, LookupError> {
        let names = with_retry(prompt, || self.catalog.search(query)).await?;
        Ok(search::rank(query, &names, &self.settings.search, false))
    }

    /// Merge resolved packages in order, sort when configured, write once
    fn apply(
        &self,
        source: &mut dyn DocumentSource,
        report: &mut BatchReport,
        packages: Vec<ResolvedPackage>,
    ) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        let mut text = source.read()?;
        for package in packages {
            let request = MergeRequest {
                block: report.block,
                name: &package.name,
                version: &package.latest_version,
                use_caret: self.settings.use_caret_syntax,
            };
            let outcome = manifest::merge(&text, &request, self.settings.merge_strategy())?;
            info!(
                "{} '{}' (version {})",
                outcome.insertion, package.name, package.latest_version
            );
            text = outcome.text;
            report.outcomes.push(PackageOutcome::Merged {
                package,
                insertion: outcome.insertion,
            });
        }

        if self.settings.sort_dependencies {
            text = manifest::sort_dependencies(&text, self.settings.use_legacy_sorting)?;
            report.sorted = true;
        }

        source.replace(&text)?;
        report.written = true;
        Ok(())
    }

    /// Search, rank, pick and fetch one package
    async fn resolve(&self, query: &str, prompt: &dyn UserPrompt, interactive: bool) -> Resolution {
        debug!("Looking for package '{}' in {}", query, self.catalog.name());

        let names = match with_retry(prompt, || self.catalog.search(query)).await {
            Ok(names) => names,
            Err(err) => return Resolution::Skipped(lookup_outcome(query, err)),
        };

        let auto_pick = self.settings.auto_add_package || !interactive;
        let chosen = match search::rank(query, &names, &self.settings.search, auto_pick) {
            SearchResult::Resolved(candidate) => candidate.name,
            SearchResult::Candidates(candidates) if candidates.is_empty() => {
                return Resolution::Skipped(PackageOutcome::NotFound {
                    query: query.to_string(),
                });
            }
            SearchResult::Candidates(mut candidates) if candidates.len() == 1 => {
                candidates.remove(0).name
            }
            SearchResult::Candidates(candidates) => {
                let options: Vec<String> = candidates.into_iter().map(|c| c.name).collect();
                if !interactive {
                    return Resolution::Skipped(PackageOutcome::Ambiguous {
                        query: query.to_string(),
                        candidates: options,
                    });
                }
                match prompt.choose(query, &options).await {
                    Some(choice) => choice,
                    None => {
                        return Resolution::Skipped(PackageOutcome::Cancelled {
                            query: query.to_string(),
                        });
                    }
                }
            }
        };

        if search::is_reserved(&chosen) {
            return Resolution::Skipped(PackageOutcome::Failed {
                query: query.to_string(),
                reason: format!("'{chosen}' is part of the SDK and needs no dependency"),
            });
        }

        debug!("Getting info for package '{}'", chosen);
        match with_retry(prompt, || self.catalog.fetch(&chosen)).await {
            Ok(package) => Resolution::Package(package),
            Err(err) => Resolution::Skipped(lookup_outcome(query, err)),
        }
    }
}

/// Sort a manifest in place; `false` when it was already sorted
///
/// Needs no catalog, so it is usable without an [`Assistant`].
pub fn sort_manifest(source: &mut dyn DocumentSource, settings: &Settings) -> Result<bool> {
    let document = source.read()?;
    let sorted = manifest::sort_dependencies(&document, settings.use_legacy_sorting)?;
    if sorted == document {
        debug!("{} is already sorted", source.describe());
        return Ok(false);
    }
    source.replace(&sorted)?;
    Ok(true)
}

/// Run a lookup, offering a retry whenever the catalog is unreachable
async fn with_retry<T, F, Fut>(
    prompt: &dyn UserPrompt,
    mut lookup: F,
) -> std::result::Result<T, LookupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, LookupError>>,
{
    loop {
        match lookup().await {
            Err(err) if err.is_retryable() => {
                warn!("{}", err);
                if !prompt.offer_retry(&err).await {
                    return Err(err);
                }
            }
            result => return result,
        }
    }
}

fn lookup_outcome(query: &str, err: LookupError) -> PackageOutcome {
    match err {
        LookupError::NotFound(_) => PackageOutcome::NotFound {
            query: query.to_string(),
        },
        err => {
            warn!("Lookup for '{}' failed: {}", query, err);
            PackageOutcome::Failed {
                query: query.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
