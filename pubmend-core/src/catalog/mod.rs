//! Package catalog lookup
//!
//! The catalog answers two questions: which package names match a query,
//! and what the latest version of a given package is.
//!
//! # Architecture
//!
//! ```text
//! pub.dev API
//!     │
//!     ├── search?q=<query>  ← Candidate package names
//!     └── packages/<name>   ← Latest version + pubspec
//!            │
//!            ▼
//!     Catalog trait (PubApi, or a test double)
//!            │
//!            ▼
//!     Search Ranker → Merge Engine
//! ```

#[cfg(feature = "catalog")]
mod pub_api;

#[cfg(feature = "catalog")]
pub use pub_api::{PubApi, DEFAULT_API_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a catalog lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The catalog service did not respond (retryable)
    #[error("The package catalog is not responding.\nPlease check your internet connection or try again. ({0})")]
    Unreachable(String),

    /// No package matches the query or name
    #[error("Package '{0}' not found.")]
    NotFound(String),

    /// Any other lookup failure (terminal for this package)
    #[error("Catalog lookup failed: {0}")]
    Failed(String),
}

impl LookupError {
    /// Only an unreachable service is worth asking the user to retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::Unreachable(_))
    }
}

/// A package resolved against the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    /// Package name as published
    pub name: String,

    /// Latest stable version
    pub latest_version: String,

    /// Whether the package depends on the Flutter SDK
    #[serde(default)]
    pub flutter_compatible: bool,
}

impl ResolvedPackage {
    pub fn new(name: impl Into<String>, latest_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest_version: latest_version.into(),
            flutter_compatible: false,
        }
    }
}

/// Trait for package catalogs
///
/// Implementations own transport details (timeouts, user agent, URL
/// building) and map their failures onto [`LookupError`].
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Candidate package names for a free-text query, in catalog order
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError>;

    /// Latest published details of a package
    async fn fetch(&self, name: &str) -> Result<ResolvedPackage, LookupError>;

    /// Catalog identifier for logging
    fn name(&self) -> &'static str;
}

/// Fixed in-memory catalog for testing
#[cfg(test)]
pub struct MockCatalog {
    pub packages: Vec<ResolvedPackage>,
}

#[cfg(test)]
#[async_trait]
impl Catalog for MockCatalog {
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError> {
        Ok(self
            .packages
            .iter()
            .filter(|p| p.name.contains(query))
            .map(|p| p.name.clone())
            .collect())
    }

    async fn fetch(&self, name: &str) -> Result<ResolvedPackage, LookupError> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
