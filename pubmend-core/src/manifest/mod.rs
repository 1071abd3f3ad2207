//! Pubspec manifest editing
//!
//! Two operations on manifest text, both pure `&str -> String`:
//!
//! - [`merge`] adds or replaces one dependency entry in a block
//! - [`sort_dependencies`] reorders the entries of every dependency block
//!
//! Everything the operation does not semantically touch stays
//! byte-identical: comments, blank lines, indentation, line endings and
//! the trailing newline.

mod layout;
mod legacy;
mod sort;
mod structured;

pub use sort::sort_dependencies;

use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};

/// Top-level dependency blocks, in sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    #[serde(rename = "dependencies")]
    Regular,
    #[serde(rename = "dev_dependencies")]
    Dev,
}

impl DependencyType {
    pub const ALL: [DependencyType; 2] = [DependencyType::Regular, DependencyType::Dev];

    /// The block's key in the manifest
    pub fn key(&self) -> &'static str {
        match self {
            DependencyType::Regular => "dependencies",
            DependencyType::Dev => "dev_dependencies",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How a merge changed the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertionMethod {
    Added,
    Replaced,
}

impl fmt::Display for InsertionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertionMethod::Added => f.write_str("Added"),
            InsertionMethod::Replaced => f.write_str("Replaced"),
        }
    }
}

/// Merge algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Parse the YAML and splice the entry into its block
    #[default]
    Structured,
    /// Treat the document as opaque lines; never fails to parse
    LineBased,
}

/// A dependency to write into a block
#[derive(Debug, Clone, Copy)]
pub struct MergeRequest<'a> {
    pub block: DependencyType,
    pub name: &'a str,
    pub version: &'a str,
    pub use_caret: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub insertion: InsertionMethod,
    pub text: String,
}

/// Version constraint as written into the manifest
pub fn constraint(version: &str, use_caret: bool) -> String {
    if use_caret {
        format!("^{version}")
    } else {
        version.to_string()
    }
}

/// Add or replace a dependency entry
pub fn merge(
    document: &str,
    request: &MergeRequest<'_>,
    strategy: MergeStrategy,
) -> Result<MergeOutcome> {
    let (bom, document) = split_bom(document);
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::Internal(anyhow::anyhow!(
            "Cannot merge a dependency without a name"
        )));
    }

    let value = constraint(request.version.trim(), request.use_caret);
    let block = request.block.key();

    let (insertion, text) = match strategy {
        MergeStrategy::Structured => structured::merge(document, block, name, &value)?,
        MergeStrategy::LineBased => legacy::merge(document, block, name, &value),
    };

    debug!(
        "{} '{}: {}' in {} ({:?} merge)",
        insertion, name, value, block, strategy
    );

    Ok(MergeOutcome {
        insertion,
        text: format!("{bom}{}", restore_trailing_newline(document, text)),
    })
}

/// Package names listed in a block, trimmed and lowercased
pub fn package_names(document: &str, block: DependencyType) -> Result<Vec<String>> {
    Ok(dependency_sources(document, block)?
        .into_iter()
        .map(|(name, _)| name)
        .collect())
}

/// Package names of a block with the source each entry is pinned to
///
/// The source is `None` for entries resolved by version from the catalog,
/// otherwise the first of `sdk`, `path`, `git` or `hosted` the entry names.
pub fn dependency_sources(
    document: &str,
    block: DependencyType,
) -> Result<Vec<(String, Option<&'static str>)>> {
    let Some(root) = parse_root(split_bom(document).1)? else {
        return Ok(Vec::new());
    };

    let sources = match root.get(block.key()) {
        Some(Value::Mapping(entries)) => entries
            .iter()
            .filter_map(|(key, value)| {
                let name = layout::key_string(key)?;
                Some((name.trim().to_lowercase(), sort::source_kind(Some(value))))
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(sources)
}

/// Split a leading UTF-8 byte order mark from the document
pub(crate) fn split_bom(document: &str) -> (&str, &str) {
    match document.strip_prefix('\u{feff}') {
        Some(rest) => document.split_at(document.len() - rest.len()),
        None => ("", document),
    }
}

/// Parse the document root; `None` for an empty or comment-only document
pub(crate) fn parse_root(document: &str) -> Result<Option<Mapping>> {
    match parse_document(document)? {
        Value::Null => Ok(None),
        Value::Mapping(root) => Ok(Some(root)),
        _ => Err(Error::malformed(
            "the top level of a pubspec must be a mapping of keys to values",
        )),
    }
}

pub(crate) fn parse_document(document: &str) -> Result<Value> {
    if document.lines().all(layout::is_trivia) {
        return Ok(Value::Null);
    }
    Ok(serde_yaml_ng::from_str(document)?)
}

/// Give `text` the same end-of-file newline state as `original`
pub(crate) fn restore_trailing_newline(original: &str, mut text: String) -> String {
    if original.ends_with('\n') {
        if !text.ends_with('\n') {
            text.push_str(layout::line_ending(original));
        }
    } else if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}
