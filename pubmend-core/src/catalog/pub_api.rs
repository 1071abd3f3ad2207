//! pub.dev catalog client
//!
//! Thin HTTP wrapper over the public pub.dev JSON API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Catalog, LookupError, ResolvedPackage};

/// Default pub.dev API base URL
pub const DEFAULT_API_URL: &str = "https://pub.dev/api/";

/// HTTP-backed package catalog
pub struct PubApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response of `GET search?q=`
#[derive(Debug, Deserialize)]
struct SearchResponse {
    packages: Vec<SearchHit>,
    #[serde(default)]
    #[allow(dead_code)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    package: String,
}

/// Response of `GET packages/<name>`
#[derive(Debug, Deserialize)]
struct PackageResponse {
    name: String,
    latest: LatestVersion,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    version: String,
    #[serde(default)]
    pubspec: serde_json::Value,
}

impl PubApi {
    /// Create a client for the public pub.dev API
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_API_URL)
    }

    /// Create a client for a mirror or self-hosted registry
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .user_agent(concat!("pubmend/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}{}", self.base_url, resource)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<T, LookupError> {
        let response = request.send().await.map_err(|e| transport_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Failed(format!(
                "HTTP {status} while looking up '{subject}'"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LookupError::Failed(format!("Invalid response for '{subject}': {e}")))
    }
}

fn transport_error(err: &reqwest::Error) -> LookupError {
    if err.is_connect() || err.is_timeout() {
        LookupError::Unreachable(err.to_string())
    } else {
        LookupError::Failed(err.to_string())
    }
}

/// A package is Flutter-compatible when its pubspec depends on `flutter`
fn depends_on_flutter(pubspec: &serde_json::Value) -> bool {
    pubspec
        .get("dependencies")
        .and_then(|deps| deps.get("flutter"))
        .is_some_and(|flutter| !flutter.is_null())
}

#[async_trait]
impl Catalog for PubApi {
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError> {
        debug!("Searching pub.dev for '{}'", query);

        let request = self.client.get(self.url("search")).query(&[("q", query)]);
        let response: SearchResponse = self.get_json(request, query).await?;

        Ok(response.packages.into_iter().map(|hit| hit.package).collect())
    }

    async fn fetch(&self, name: &str) -> Result<ResolvedPackage, LookupError> {
        debug!("Fetching package info for '{}'", name);

        let request = self.client.get(self.url(&format!("packages/{name}")));
        let response: PackageResponse = self.get_json(request, name).await?;

        Ok(ResolvedPackage {
            flutter_compatible: depends_on_flutter(&response.latest.pubspec),
            name: response.name,
            latest_version: response.latest.version,
        })
    }

    fn name(&self) -> &'static str {
        "pub.dev"
    }
}
