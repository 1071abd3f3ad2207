//! Line-based merge
//!
//! Treats the manifest as plain lines and never parses it, so it keeps
//! working on files the YAML parser rejects. Entries are always written
//! with two-space indentation and unquoted.

use super::InsertionMethod;

pub(super) fn merge(document: &str, block: &str, name: &str, version: &str) -> (InsertionMethod, String) {
    let cr = if document.contains("\r\n") { "\r" } else { "" };
    let mut lines: Vec<String> = document.split('\n').map(str::to_string).collect();

    let header_text = format!("{block}:");
    let header = match lines.iter().position(|line| line.trim() == header_text) {
        Some(index) => index,
        None => {
            lines.push(format!("{header_text}{cr}"));
            lines.len() - 1
        }
    };
    if header == lines.len() - 1 {
        lines.push(String::new());
    }

    let entry = format!("  {name}: {version}");

    let insertion = match find_entry(&lines, header, name) {
        Some(index) => {
            let keep_cr = if lines[index].ends_with('\r') { "\r" } else { "" };
            lines[index] = format!("{entry}{keep_cr}");
            InsertionMethod::Replaced
        }
        None => {
            let at = lines
                .iter()
                .enumerate()
                .skip(header + 1)
                .find(|(_, line)| !line.starts_with(' ') && !is_comment(line))
                .map_or(lines.len(), |(index, _)| index);
            lines.insert(at, format!("{entry}{cr}"));
            InsertionMethod::Added
        }
    };

    (insertion, lines.join("\n").trim().to_string())
}

/// Index of the line declaring `name` inside the block opened at `header`
fn find_entry(lines: &[String], header: usize, name: &str) -> Option<usize> {
    for (index, line) in lines.iter().enumerate().skip(header + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('\t') {
            // Next top-level key
            return None;
        }
        let key = line.split(':').next().unwrap_or_default().trim();
        if key == name {
            return Some(index);
        }
    }
    None
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}
