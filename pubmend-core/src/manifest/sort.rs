//! Dependency block sorting
//!
//! Entries are reordered by moving their original lines, so values,
//! nested sources and the comments written above an entry travel with it.
//! Comments after the last entry stay at the end of the block.

use serde_yaml_ng::{Mapping, Value};
use tracing::{debug, warn};

use super::layout::{self, content, terminator, Layout};
use super::{parse_document, restore_trailing_newline, split_bom, DependencyType};
use crate::error::Result;

/// Source kinds clustered first by legacy grouping, in order
const SOURCE_BUCKETS: [&str; 4] = ["sdk", "path", "git", "hosted"];

/// Sort every dependency block of a manifest
///
/// With `legacy_grouping`, entries taken from the SDK, a local path, git or
/// a custom host come first (in that order), each group sorted by name,
/// followed by the remaining entries.
pub fn sort_dependencies(document: &str, legacy_grouping: bool) -> Result<String> {
    let (bom, body) = split_bom(document);
    Ok(format!("{bom}{}", sort_body(body, legacy_grouping)?))
}

fn sort_body(document: &str, legacy_grouping: bool) -> Result<String> {
    let Value::Mapping(root) = parse_document(document)? else {
        debug!("Manifest has no top-level mapping; nothing to sort");
        return Ok(document.to_string());
    };

    let mut sorted_root = root.clone();
    let mut blocks = Vec::new();
    for block in DependencyType::ALL {
        if let Some(Value::Mapping(entries)) = root.get(block.key()) {
            let sorted = sorted_entries(entries, legacy_grouping);
            sorted_root.insert(block.key().into(), Value::Mapping(sorted.clone()));
            blocks.push((block, sorted));
        }
    }

    let mut text = document.to_string();
    for (block, sorted) in &blocks {
        let layout = Layout::scan(&text);
        let Some(section) = layout.section(block.key()) else {
            warn!(
                "Could not locate '{}' in the document text; re-serializing the whole file",
                block
            );
            let rendered = layout::render_document(&sorted_root, layout.eol)?;
            return Ok(restore_trailing_newline(document, rendered));
        };

        text = match section.line.inline_body() {
            "" => sort_block_lines(&layout, section, sorted)?,
            alias if alias.starts_with('*') => {
                debug!("{} is an alias ({}); leaving it alone", block, alias);
                continue;
            }
            _ => layout.replace_section(section, sorted, 2)?,
        };
        debug!("Sorted {} entries in {}", sorted.len(), block);
    }

    Ok(restore_trailing_newline(document, text))
}

/// Move the lines of a block-style section into sorted order
fn sort_block_lines(
    layout: &Layout<'_>,
    section: &layout::Section,
    sorted: &Mapping,
) -> Result<String> {
    let block = layout.block(section);
    let indent = block.child_indent.unwrap_or(2);

    let mut scanned_keys: Vec<&str> = block.entries.iter().map(|e| e.key.as_str()).collect();
    let mut parsed_keys: Vec<String> = sorted.keys().filter_map(layout::key_string).collect();
    scanned_keys.sort_unstable();
    parsed_keys.sort_unstable();
    if parsed_keys.len() != sorted.len() || scanned_keys != parsed_keys {
        warn!(
            "Could not map every entry of '{}' to its lines; rewriting the section",
            section.key
        );
        return Ok(layout.replace_section(section, sorted, indent)?);
    }

    let Some(span) = block.span() else {
        return Ok(layout.lines.concat());
    };

    let mut lines = Vec::new();
    for key in sorted.keys().filter_map(layout::key_string) {
        let Some(entry) = block.entry(&key) else {
            continue;
        };
        for index in entry.start..entry.end {
            let line = layout.lines[index];
            let eol = match terminator(line) {
                "" => layout.eol,
                eol => eol,
            };
            lines.push(format!("{}{eol}", content(line).trim_end()));
        }
    }

    Ok(layout.splice(span, lines))
}

/// Entries of a block in sorted order, each key once
fn sorted_entries(entries: &Mapping, legacy_grouping: bool) -> Mapping {
    let mut base: Vec<&Value> = entries.keys().collect();
    base.sort_by(|a, b| layout::key_string(a).cmp(&layout::key_string(b)));

    let mut order: Vec<&Value> = Vec::with_capacity(base.len());
    if legacy_grouping {
        for bucket in SOURCE_BUCKETS {
            order.extend(
                base.iter()
                    .copied()
                    .filter(|key| source_kind(entries.get(*key)) == Some(bucket)),
            );
        }
    }
    order.extend(base.iter().copied());

    let mut sorted = Mapping::new();
    for key in order {
        if sorted.contains_key(key) {
            continue;
        }
        if let Some(value) = entries.get(key) {
            sorted.insert(key.clone(), value.clone());
        }
    }
    sorted
}

/// First source bucket named by a mapping value's own keys
pub(super) fn source_kind(value: Option<&Value>) -> Option<&'static str> {
    let Some(Value::Mapping(source)) = value else {
        return None;
    };
    SOURCE_BUCKETS
        .into_iter()
        .find(|bucket| source.contains_key(*bucket))
}
