//! Structured merge
//!
//! The parsed tree decides what changes; the layout decides where the bytes
//! go. Only the lines of the touched entry (or section) are rewritten.

use serde_yaml_ng::{Mapping, Value};
use tracing::warn;

use super::layout::{self, Layout, Section};
use super::{parse_root, InsertionMethod};
use crate::error::{Error, Result};

/// Indentation used for blocks that have no entries yet
const DEFAULT_INDENT: usize = 2;

pub(super) fn merge(
    document: &str,
    block: &str,
    name: &str,
    version: &str,
) -> Result<(InsertionMethod, String)> {
    let layout = Layout::scan(document);

    let Some(mut root) = parse_root(document)? else {
        return Ok((InsertionMethod::Added, append_section(&layout, block, name, version)?));
    };

    let current = match root.get(block) {
        Some(value) => value.clone(),
        None => {
            return Ok((InsertionMethod::Added, append_section(&layout, block, name, version)?));
        }
    };

    let Some(section) = layout.section(block) else {
        return reserialize(&mut root, &layout, block, current, name, version);
    };

    let entries = match current {
        Value::Mapping(entries) => entries,
        // `dependencies:` with a null, scalar or sequence value becomes a
        // mapping holding just the new entry
        _ => {
            let mut entries = Mapping::new();
            entries.insert(name.into(), version.into());
            let text = layout.replace_section(section, &entries, DEFAULT_INDENT)?;
            return Ok((InsertionMethod::Added, text));
        }
    };

    let insertion = if entries.contains_key(name) {
        InsertionMethod::Replaced
    } else {
        InsertionMethod::Added
    };

    match section.line.inline_body() {
        "" => {}
        alias if alias.starts_with('*') => {
            return Err(Error::malformed(format!(
                "'{block}' reuses another block through the alias {alias}; \
                 edit the block that defines the anchor instead"
            )));
        }
        _ => {
            // Flow style: `dependencies: {a: ^1.0.0}`
            let text = rewrite_section(&layout, section, entries, name, version, DEFAULT_INDENT)?;
            return Ok((insertion, text));
        }
    }

    let scanned = layout.block(section);
    let indent = scanned.child_indent.unwrap_or(DEFAULT_INDENT);

    let parsed_keys: Vec<Option<String>> = entries.keys().map(layout::key_string).collect();
    let scanned_keys: Vec<Option<String>> =
        scanned.entries.iter().map(|e| Some(e.key.clone())).collect();
    if parsed_keys != scanned_keys {
        warn!(
            "Could not map every entry of '{}' to its lines; rewriting the section",
            block
        );
        let text = rewrite_section(&layout, section, entries, name, version, indent)?;
        return Ok((insertion, text));
    }

    let text = match scanned.entry(name) {
        Some(entry) => {
            let key_text = layout.content(entry.key_line);
            let line = format!(
                "{} {}{}",
                entry.line.head(key_text),
                layout::render_scalar(version),
                entry.line.comment()
            );
            layout.splice(
                entry.key_line..entry.end,
                vec![layout.terminated(&line, entry.end - 1)],
            )
        }
        None => {
            let at = scanned
                .entries
                .last()
                .map_or(section.header + 1, |last| last.end);
            let lines = layout::render_entry(&name.into(), &version.into(), indent)?
                .into_iter()
                .map(|line| format!("{line}{}", layout.eol))
                .collect();
            layout.splice(at..at, lines)
        }
    };

    Ok((insertion, text))
}

/// Append a new `block:` section holding one entry at the end of the document
fn append_section(layout: &Layout<'_>, block: &str, name: &str, version: &str) -> Result<String> {
    let mut lines = vec![format!("{block}:{}", layout.eol)];
    for line in layout::render_entry(&name.into(), &version.into(), DEFAULT_INDENT)? {
        lines.push(format!("{line}{}", layout.eol));
    }
    let end = layout.lines.len();
    Ok(layout.splice(end..end, lines))
}

fn rewrite_section(
    layout: &Layout<'_>,
    section: &Section,
    mut entries: Mapping,
    name: &str,
    version: &str,
    indent: usize,
) -> Result<String> {
    entries.insert(name.into(), version.into());
    Ok(layout.replace_section(section, &entries, indent)?)
}

/// Last resort when the parser found the block but the layout did not
fn reserialize(
    root: &mut Mapping,
    layout: &Layout<'_>,
    block: &str,
    current: Value,
    name: &str,
    version: &str,
) -> Result<(InsertionMethod, String)> {
    warn!(
        "Could not locate '{}' in the document text; re-serializing the whole file",
        block
    );

    let mut entries = match current {
        Value::Mapping(entries) => entries,
        _ => Mapping::new(),
    };
    let insertion = match entries.insert(name.into(), version.into()) {
        Some(_) => InsertionMethod::Replaced,
        None => InsertionMethod::Added,
    };
    root.insert(block.into(), Value::Mapping(entries));

    Ok((insertion, layout::render_document(root, layout.eol)?))
}
