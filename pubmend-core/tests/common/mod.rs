//! Test helpers shared by the integration tests
//!
//! A scripted catalog and a scripted prompt, so whole flows run without
//! network access or a terminal.

#![allow(dead_code)]

use async_trait::async_trait;
use pubmend_core::assist::UserPrompt;
use pubmend_core::catalog::{Catalog, LookupError, ResolvedPackage};
use pubmend_core::manifest::DependencyType;
use std::collections::VecDeque;
use std::sync::{Mutex, Once};

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Catalog over a fixed package list
///
/// `search` returns every name containing the query, in list order.
/// Queued failures are returned (one per call) before any real answer.
pub struct ScriptedCatalog {
    packages: Vec<ResolvedPackage>,
    extra_names: Vec<String>,
    search_failures: Mutex<VecDeque<LookupError>>,
    fetch_failures: Mutex<VecDeque<LookupError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCatalog {
    pub fn new(packages: &[(&str, &str)]) -> Self {
        Self {
            packages: packages
                .iter()
                .map(|(name, version)| ResolvedPackage::new(*name, *version))
                .collect(),
            extra_names: Vec::new(),
            search_failures: Mutex::new(VecDeque::new()),
            fetch_failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Names returned by search that cannot be fetched (e.g. `dart:io`)
    pub fn with_search_only(mut self, names: &[&str]) -> Self {
        self.extra_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn fail_next_search(&self, error: LookupError) {
        self.search_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_fetch(&self, error: LookupError) {
        self.fetch_failures.lock().unwrap().push_back(error);
    }

    /// Every call made, as `search:<query>` / `fetch:<name>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for ScriptedCatalog {
    async fn search(&self, query: &str) -> Result<Vec<String>, LookupError> {
        self.calls.lock().unwrap().push(format!("search:{query}"));
        if let Some(error) = self.search_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .extra_names
            .iter()
            .cloned()
            .chain(self.packages.iter().map(|p| p.name.clone()))
            .filter(|name| name.contains(query))
            .collect())
    }

    async fn fetch(&self, name: &str) -> Result<ResolvedPackage, LookupError> {
        self.calls.lock().unwrap().push(format!("fetch:{name}"));
        if let Some(error) = self.fetch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.packages
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Prompt with pre-recorded answers
///
/// `choose` answers by name; an unknown query or an exhausted queue is a
/// dismissed prompt.
#[derive(Default)]
pub struct ScriptedPrompt {
    query: Option<String>,
    choices: Mutex<VecDeque<Option<String>>>,
    retries: Mutex<VecDeque<bool>>,
    shown: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(query.to_string());
        self
    }

    pub fn then_choose(self, choice: Option<&str>) -> Self {
        self.choices
            .lock()
            .unwrap()
            .push_back(choice.map(str::to_string));
        self
    }

    pub fn then_retry(self, retry: bool) -> Self {
        self.retries.lock().unwrap().push_back(retry);
        self
    }

    /// Candidate lists shown to the user, per query
    pub fn shown(&self) -> Vec<(String, Vec<String>)> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn ask_query(&self, _block: DependencyType) -> Option<String> {
        self.query.clone()
    }

    async fn choose(&self, query: &str, options: &[String]) -> Option<String> {
        self.shown
            .lock()
            .unwrap()
            .push((query.to_string(), options.to_vec()));
        self.choices.lock().unwrap().pop_front().flatten()
    }

    async fn offer_retry(&self, _error: &LookupError) -> bool {
        self.retries.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// A small but realistic Flutter manifest
pub const FLUTTER_PUBSPEC: &str = "\
name: my_app
description: A new Flutter project.

# Prevent accidental publishing
publish_to: 'none'

version: 1.0.0+1

environment:
  sdk: '>=3.0.0 <4.0.0'

dependencies:
  flutter:
    sdk: flutter

  # Icons
  cupertino_icons: ^1.0.2

dev_dependencies:
  flutter_test:
    sdk: flutter
  flutter_lints: ^2.0.0

flutter:
  uses-material-design: true
";
