//! Line-level layout of a manifest
//!
//! serde_yaml_ng tells us what the document means; the layout tells us
//! where each top-level section and each block entry physically lives so
//! edits can be spliced in without touching any other byte.

use serde_yaml_ng::{Mapping, Value};
use std::ops::Range;

/// Split into physical lines, terminators included
pub(crate) fn split_lines(document: &str) -> Vec<&str> {
    document.split_inclusive('\n').collect()
}

/// Line text without its `\n` / `\r\n` terminator
pub(crate) fn content(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// The `\n` / `\r\n` terminator of a line, empty for an unterminated last line
pub(crate) fn terminator(line: &str) -> &str {
    &line[content(line).len()..]
}

/// Dominant line ending of a document
pub(crate) fn line_ending(document: &str) -> &'static str {
    if document.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

pub(crate) fn indent_of(content: &str) -> usize {
    content.len() - content.trim_start_matches(' ').len()
}

/// Blank and comment-only lines
pub(crate) fn is_trivia(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// A `key: value  # comment` line
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyLine {
    pub indent: usize,
    pub key: String,
    /// Byte offset just past the `:`
    pub colon_end: usize,
    /// Inline value, trimmed; empty when the value lives on the next lines
    pub value: String,
    /// Trailing comment with its leading whitespace
    pub comment: Option<String>,
}

impl KeyLine {
    /// Indentation, key and colon exactly as written
    pub fn head<'a>(&self, content: &'a str) -> &'a str {
        &content[..self.colon_end]
    }

    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }

    /// Anchor and tag properties leading the inline value, e.g. `&deps`
    pub fn properties(&self) -> &str {
        split_properties(&self.value).0
    }

    /// Inline value after its properties; empty for a block body
    pub fn inline_body(&self) -> &str {
        split_properties(&self.value).1
    }
}

/// Split `&anchor !tag rest` into the properties and the rest
fn split_properties(value: &str) -> (&str, &str) {
    let mut end = 0;
    let mut rest = value;
    while rest.starts_with('&') || rest.starts_with('!') {
        let token = rest.find(char::is_whitespace).unwrap_or(rest.len());
        end = value.len() - rest.len() + token;
        rest = rest[token..].trim_start();
    }
    (&value[..end], rest)
}

pub(crate) fn parse_key_line(content: &str) -> Option<KeyLine> {
    let indent = indent_of(content);
    let rest = &content[indent..];

    let first = rest.chars().next()?;
    if matches!(
        first,
        '#' | '-' | '[' | '{' | '?' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`'
    ) {
        return None;
    }

    let (key, colon) = if first == '"' || first == '\'' {
        let close = closing_quote(rest)?;
        let key: String = serde_yaml_ng::from_str(&rest[..=close]).ok()?;
        let after = &rest[close + 1..];
        let gap = after.len() - after.trim_start_matches(' ').len();
        if !after[gap..].starts_with(':') {
            return None;
        }
        (key, close + 1 + gap)
    } else {
        let colon = plain_key_colon(rest)?;
        (rest[..colon].trim_end().to_string(), colon)
    };

    let after_colon = &rest[colon + 1..];
    if !(after_colon.is_empty() || after_colon.starts_with(' ') || after_colon.starts_with('\t'))
    {
        return None;
    }

    let (value, comment) = split_comment(after_colon);
    Some(KeyLine {
        indent,
        key,
        colon_end: indent + colon + 1,
        value: value.trim().to_string(),
        comment: comment.map(str::to_string),
    })
}

/// Index of the quote closing the scalar that opens `text`
fn closing_quote(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b'\'' if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Colon ending a plain key: followed by whitespace or end of line
fn plain_key_colon(text: &str) -> Option<usize> {
    let mut previous_is_space = false;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '#' if previous_is_space => return None,
            ':' => {
                let next = chars.peek().map(|(_, n)| *n);
                if matches!(next, None | Some(' ') | Some('\t')) {
                    return (i > 0).then_some(i);
                }
            }
            _ => {}
        }
        previous_is_space = c == ' ' || c == '\t';
    }
    None
}

/// Split an inline value from its trailing comment
fn split_comment(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim_start();
    let offset = text.len() - trimmed.len();

    // A quoted scalar may contain '#'; only look after it closes
    let search_from = match trimmed.chars().next() {
        Some('"') | Some('\'') => closing_quote(trimmed).map_or(0, |close| offset + close + 1),
        _ => 0,
    };

    let bytes = text.as_bytes();
    let hash = (search_from..bytes.len()).find(|&i| {
        bytes[i] == b'#' && (i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t')
    });

    match hash {
        Some(hash) => {
            let value_end = text[..hash]
                .trim_end_matches(|c| c == ' ' || c == '\t')
                .len();
            (&text[..value_end], Some(&text[value_end..]))
        }
        None => (text, None),
    }
}

/// Whether `text` can be written as a plain YAML scalar and read back unchanged
fn is_plain_safe(text: &str) -> bool {
    !text.is_empty()
        && text.trim() == text
        && !text.contains(": ")
        && !text.contains(" #")
        && !text.ends_with(':')
        && matches!(
            serde_yaml_ng::from_str::<Value>(text),
            Ok(Value::String(ref parsed)) if parsed == text
        )
}

/// Render a string scalar, quoting only when the plain form would change meaning
pub(crate) fn render_scalar(text: &str) -> String {
    if is_plain_safe(text) {
        return text.to_string();
    }
    serde_yaml_ng::to_string(text)
        .map(|rendered| rendered.trim_end().to_string())
        .unwrap_or_else(|_| format!("'{}'", text.replace('\'', "''")))
}

/// Mapping keys as the layout sees them
pub(crate) fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Serializers write `~`/empty values as `null`; an unconstrained
/// dependency must stay an empty value
pub(crate) fn strip_null_placeholders(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            let body = content(line);
            match body.strip_suffix(": null") {
                Some(head) => format!("{head}:{}", terminator(line)),
                None => line.to_string(),
            }
        })
        .collect()
}

/// Render one block entry as indented lines (no terminators)
pub(crate) fn render_entry(
    key: &Value,
    value: &Value,
    indent: usize,
) -> Result<Vec<String>, serde_yaml_ng::Error> {
    let pad = " ".repeat(indent);

    if let Value::String(key) = key {
        match value {
            Value::Null => return Ok(vec![format!("{pad}{}:", render_scalar(key))]),
            Value::String(text) => {
                return Ok(vec![format!(
                    "{pad}{}: {}",
                    render_scalar(key),
                    render_scalar(text)
                )])
            }
            _ => {}
        }
    }

    let mut single = Mapping::new();
    single.insert(key.clone(), value.clone());
    let rendered = serde_yaml_ng::to_string(&single)?;

    Ok(strip_null_placeholders(&rendered)
        .lines()
        .map(|line| format!("{pad}{line}"))
        .collect())
}

/// Serialize a whole document from its tree, in the given line ending
pub(crate) fn render_document(root: &Mapping, eol: &str) -> Result<String, serde_yaml_ng::Error> {
    let rendered = strip_null_placeholders(&serde_yaml_ng::to_string(root)?);
    if eol == "\n" {
        Ok(rendered)
    } else {
        Ok(rendered.replace('\n', eol))
    }
}

/// A top-level `key:` and every line up to the next top-level key
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub key: String,
    pub header: usize,
    pub end: usize,
    pub line: KeyLine,
}

/// One entry of a block mapping
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: String,
    /// First line, including leading comments and blank lines
    pub start: usize,
    pub key_line: usize,
    /// One past the last line of the (possibly nested) value
    pub end: usize,
    pub line: KeyLine,
}

/// Entries of a block-style mapping section
#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub entries: Vec<Entry>,
    pub child_indent: Option<usize>,
}

impl Block {
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Lines covered by the entries, leading comments included
    pub fn span(&self) -> Option<Range<usize>> {
        Some(self.entries.first()?.start..self.entries.last()?.end)
    }
}

#[derive(Debug)]
pub(crate) struct Layout<'a> {
    pub lines: Vec<&'a str>,
    pub sections: Vec<Section>,
    pub eol: &'static str,
}

impl<'a> Layout<'a> {
    pub fn scan(document: &'a str) -> Self {
        let lines = split_lines(document);
        let mut sections: Vec<Section> = Vec::new();
        let mut open = false;

        for (i, line) in lines.iter().enumerate() {
            let text = content(line);
            if is_trivia(text) || text.starts_with(' ') || text.starts_with('\t') {
                continue;
            }

            if text.starts_with("---") || text.starts_with("...") {
                if open {
                    if let Some(last) = sections.last_mut() {
                        last.end = i;
                    }
                }
                open = false;
                continue;
            }

            // Sequence items and other non-key lines continue the open section
            let Some(key_line) = parse_key_line(text) else {
                continue;
            };

            if open {
                if let Some(last) = sections.last_mut() {
                    last.end = i;
                }
            }
            sections.push(Section {
                key: key_line.key.clone(),
                header: i,
                end: lines.len(),
                line: key_line,
            });
            open = true;
        }

        Self {
            lines,
            sections,
            eol: line_ending(document),
        }
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn content(&self, index: usize) -> &'a str {
        content(self.lines[index])
    }

    /// Entries of a section whose value is a block mapping
    pub fn block(&self, section: &Section) -> Block {
        let body = section.header + 1..section.end;
        let child_indent = body
            .clone()
            .map(|i| self.content(i))
            .find(|text| !is_trivia(text))
            .map(indent_of)
            .filter(|indent| *indent > 0);

        let mut entries: Vec<Entry> = Vec::new();
        let mut pending: Option<usize> = None;

        for i in body {
            let text = self.content(i);
            if is_trivia(text) {
                pending.get_or_insert(i);
                continue;
            }

            if Some(indent_of(text)) == child_indent {
                if let Some(line) = parse_key_line(text) {
                    entries.push(Entry {
                        key: line.key.clone(),
                        start: pending.take().unwrap_or(i),
                        key_line: i,
                        end: i + 1,
                        line,
                    });
                    continue;
                }
            }

            // Nested value lines; comments in between belong to the entry
            pending = None;
            if let Some(last) = entries.last_mut() {
                last.end = i + 1;
            }
        }

        Block {
            entries,
            child_indent,
        }
    }

    /// Replace `range` with `replacement` lines (terminators included)
    pub fn splice(&self, range: Range<usize>, replacement: Vec<String>) -> String {
        let mut out = String::new();
        for line in &self.lines[..range.start] {
            out.push_str(line);
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(self.eol);
        }
        for line in replacement {
            out.push_str(&line);
        }
        for line in &self.lines[range.end..] {
            out.push_str(line);
        }
        out
    }

    /// A line as it would read after `text`, keeping the original terminator
    /// or adding one when it had none
    pub fn terminated(&self, text: &str, index: usize) -> String {
        let term = self.lines.get(index).map(|l| terminator(l)).unwrap_or("");
        let term = if term.is_empty() { self.eol } else { term };
        format!("{text}{term}")
    }

    /// Rewrite a section so its value is the block mapping `entries`
    ///
    /// The header keeps its key, anchor, tag and trailing comment; comment
    /// and blank lines of the old value are kept after the new entries.
    pub fn replace_section(
        &self,
        section: &Section,
        entries: &Mapping,
        indent: usize,
    ) -> Result<String, serde_yaml_ng::Error> {
        let header = self.content(section.header);
        let properties = match section.line.properties() {
            "" => String::new(),
            properties => format!(" {properties}"),
        };
        let mut replacement = vec![format!(
            "{}{}{}{}",
            section.line.head(header),
            properties,
            section.line.comment(),
            self.eol
        )];

        for (key, value) in entries {
            for line in render_entry(key, value, indent)? {
                replacement.push(format!("{line}{}", self.eol));
            }
        }

        for i in section.header + 1..section.end {
            if is_trivia(self.content(i)) {
                replacement.push(self.terminated(self.content(i), i));
            }
        }

        Ok(self.splice(section.header..section.end, replacement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_key_line() {
        let line = parse_key_line("  http: ^1.2.0  # pinned").unwrap();
        assert_eq!(line.indent, 2);
        assert_eq!(line.key, "http");
        assert_eq!(line.value, "^1.2.0");
        assert_eq!(line.comment.as_deref(), Some("  # pinned"));
        assert_eq!(line.head("  http: ^1.2.0  # pinned"), "  http:");
    }

    #[test]
    fn test_parse_quoted_key_line() {
        let line = parse_key_line("  'my pkg': \"1.0 # not a comment\"").unwrap();
        assert_eq!(line.key, "my pkg");
        assert_eq!(line.value, "\"1.0 # not a comment\"");
        assert!(line.comment.is_none());
    }

    #[test]
    fn test_header_properties() {
        let line = parse_key_line("dependencies: &deps !!map {a: 1}  # shared").unwrap();
        assert_eq!(line.properties(), "&deps !!map");
        assert_eq!(line.inline_body(), "{a: 1}");

        let line = parse_key_line("dependencies: &deps").unwrap();
        assert_eq!(line.properties(), "&deps");
        assert_eq!(line.inline_body(), "");

        let line = parse_key_line("dev_dependencies: *deps").unwrap();
        assert_eq!(line.properties(), "");
        assert_eq!(line.inline_body(), "*deps");
    }

    #[test]
    fn test_non_key_lines() {
        assert!(parse_key_line("- item").is_none());
        assert!(parse_key_line("# comment: yes").is_none());
        assert!(parse_key_line("url: https://example.com").is_some());
        assert!(parse_key_line("https://example.com").is_none());
        assert!(parse_key_line("{a: 1}").is_none());
    }

    #[test]
    fn test_sections_and_entries() {
        let doc = "name: app\n\
                   # deps\n\
                   dependencies:\n\
                   \x20 # state\n\
                   \x20 provider: ^6.0.0\n\
                   \x20 my_lib:\n\
                   \x20   path: ../my_lib\n\
                   \n\
                   \x20 # trailing\n\
                   dev_dependencies:\n\
                   \x20 test: any\n";
        let layout = Layout::scan(doc);

        let keys: Vec<&str> = layout.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "dependencies", "dev_dependencies"]);

        let deps = layout.section("dependencies").unwrap();
        assert_eq!((deps.header, deps.end), (2, 9));

        let block = layout.block(deps);
        assert_eq!(block.child_indent, Some(2));
        let spans: Vec<(&str, usize, usize, usize)> = block
            .entries
            .iter()
            .map(|e| (e.key.as_str(), e.start, e.key_line, e.end))
            .collect();
        assert_eq!(spans, vec![("provider", 3, 4, 5), ("my_lib", 5, 5, 7)]);
    }

    #[test]
    fn test_render_scalar_quotes_only_when_needed() {
        assert_eq!(render_scalar("^2.0.0"), "^2.0.0");
        assert_eq!(render_scalar("1.0.0"), "1.0.0");
        assert_eq!(render_scalar("any"), "any");
        assert_ne!(render_scalar("1.0"), "1.0");
        assert_ne!(render_scalar("true"), "true");
        assert_ne!(render_scalar(">=1.0.0 <2.0.0: x"), ">=1.0.0 <2.0.0: x");
    }

    #[test]
    fn test_render_nested_entry() {
        let value: Value = serde_yaml_ng::from_str("git:\n  url: https://example.com/x.git\n").unwrap();
        let lines = render_entry(&Value::String("x".into()), &value, 2).unwrap();
        assert_eq!(
            lines,
            vec!["  x:", "    git:", "      url: https://example.com/x.git"]
        );
    }

    #[test]
    fn test_strip_null_placeholders() {
        assert_eq!(strip_null_placeholders("a: null\nb: 1\n"), "a:\nb: 1\n");
    }

    #[test]
    fn test_render_document_keeps_line_ending() {
        let root: Mapping = serde_yaml_ng::from_str("name: app\ndependencies:\n  a:\n").unwrap();
        assert_eq!(
            render_document(&root, "\r\n").unwrap(),
            "name: app\r\ndependencies:\r\n  a:\r\n"
        );
    }

    #[test]
    fn test_crlf_lines() {
        let layout = Layout::scan("a: 1\r\nb: 2");
        assert_eq!(layout.eol, "\r\n");
        assert_eq!(layout.content(0), "a: 1");
        assert_eq!(terminator(layout.lines[0]), "\r\n");
        assert_eq!(terminator(layout.lines[1]), "");
    }
}
