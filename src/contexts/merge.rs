use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::scanner::{self, find_matching};
use crate::data::FunctionRecord;

const PACKAGE_KEYWORD: &str = "package ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Function in the existing fragment to drop so the new fragment's
    /// definition is the only one left.
    pub replace_function: Option<String>,
}

impl MergeOptions {
    pub fn replacing(name: impl Into<String>) -> Self {
        Self {
            replace_function: Some(name.into()),
        }
    }
}

fn import_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*import[ \t]*\(").expect("valid regex"))
}

fn single_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*import[ \t]+((?:[\w.]+[ \t]+)?"[^"\n]*")[ \t]*(?://[^\n]*)?$"#)
            .expect("valid regex")
    })
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"))
}

/// Imports pulled out of a fragment, plus the fragment without them.
#[derive(Debug)]
struct ImportSection {
    entries: BTreeSet<String>,
    stripped: String,
    /// Offset in `stripped` where the first import declaration used to be.
    anchor: Option<usize>,
}

impl ImportSection {
    fn parse(text: &str) -> Self {
        let mut entries = BTreeSet::new();
        let mut anchor = None;
        let mut stripped = String::with_capacity(text.len());
        let mut last = 0;

        for caps in single_import_re().captures_iter(text) {
            let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            stripped.push_str(&text[last..whole.start()]);
            anchor.get_or_insert(stripped.len());
            entries.insert(spec.as_str().trim().to_string());
            last = whole.end();
        }
        stripped.push_str(&text[last..]);

        let mut from = 0;
        while let Some(open) = import_block_re().find_at(&stripped, from) {
            match find_matching(&stripped, open.end(), b'(', b')') {
                Some(close) => {
                    entries.extend(block_entries(&stripped[open.end()..close]));
                    let start = open.start();
                    stripped = format!("{}{}", &stripped[..start], &stripped[close + 1..]);
                    anchor = Some(anchor.map_or(start, |a: usize| a.min(start)));
                    from = start;
                }
                None => {
                    warn!("unterminated import block, leaving it untouched");
                    break;
                }
            }
        }

        Self {
            entries,
            stripped,
            anchor,
        }
    }
}

fn block_entries(inner: &str) -> impl Iterator<Item = String> + '_ {
    inner
        .lines()
        .map(strip_line_comment)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

/// Import specs never contain `//` inside their quoted path.
fn strip_line_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or(line).trim()
}

fn render_import_block(entries: &BTreeSet<String>) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = entries.iter().map(String::as_str).collect();
    format!("import (\n\t{}\n)", lines.join("\n\t"))
}

/// First `package` line of the fragment.
pub fn package_line(fragment: &str) -> Option<String> {
    fragment
        .lines()
        .find(|line| is_package_line(line))
        .map(|line| line.trim().to_string())
}

fn is_package_line(line: &str) -> bool {
    line.trim_start().starts_with(PACKAGE_KEYWORD)
}

fn strip_package_lines(fragment: &str) -> String {
    fragment
        .lines()
        .filter(|line| !is_package_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every import of the fragment, block and single-line forms together.
pub fn import_set(fragment: &str) -> BTreeSet<String> {
    ImportSection::parse(fragment).entries
}

pub fn has_function(fragment: &str, name: &str) -> bool {
    scanner::scan(fragment, Path::new(""))
        .iter()
        .any(|record| record.name == name)
}

/// Removes every definition of `name`, from its doc comment through the
/// closing brace.
pub fn remove_function(fragment: &str, name: &str) -> String {
    let records = scanner::scan(fragment, Path::new(""));
    let mut out = fragment.to_string();
    for record in records.iter().rev().filter(|r| r.name == name) {
        out.replace_range(span_with_doc(fragment, record), "");
    }
    out
}

/// Span of the record widened backwards over its attached doc comment.
fn span_with_doc(fragment: &str, record: &FunctionRecord) -> Range<usize> {
    let doc = record.doc_comment.as_str();
    let before = fragment[..record.span.start].trim_end();
    if !doc.is_empty() && before.ends_with(doc) {
        before.len() - doc.len()..record.span.end
    } else {
        record.span.clone()
    }
}

/// Merges `new` into `existing`.
///
/// The result has at most one package line (the existing one wins), one
/// import block holding the sorted union of both sides, and the existing
/// declarations followed by the new ones. Functions and other top-level
/// declarations of `new` that already appear verbatim in `existing` are not
/// appended a second time. `replace_function` only takes effect when `new`
/// defines that function itself.
pub fn merge(existing: &str, new: &str, options: &MergeOptions) -> String {
    let mut existing = existing.to_string();

    match (package_line(&existing), package_line(new)) {
        (None, Some(new_pkg)) => {
            existing = if existing.trim().is_empty() {
                new_pkg
            } else {
                format!("{}\n\n{}", new_pkg, existing)
            };
        }
        (Some(old_pkg), Some(new_pkg)) if old_pkg != new_pkg => {
            warn!(
                "package declarations disagree ('{}' vs '{}'), keeping '{}'",
                old_pkg, new_pkg, old_pkg
            );
        }
        _ => {}
    }

    let new_body = strip_package_lines(new);

    if let Some(name) = &options.replace_function {
        if !has_function(&new_body, name) {
            debug!("new fragment does not define {}, keeping the existing one", name);
        } else if has_function(&existing, name) {
            debug!("replacing existing definition of {}", name);
            existing = remove_function(&existing, name);
        }
    }

    let existing_section = ImportSection::parse(&existing);
    let new_section = ImportSection::parse(&new_body);

    let mut imports = existing_section.entries.clone();
    imports.extend(new_section.entries.iter().cloned());
    let block = render_import_block(&imports);

    let mut merged = splice_imports(&existing_section, &block);
    let appended = without_known_declarations(&new_section.stripped, &merged);
    if !appended.trim().is_empty() {
        merged = format!("{}\n\n{}", merged.trim_end(), appended.trim());
    }

    tidy(&merged)
}

fn splice_imports(section: &ImportSection, block: &str) -> String {
    let text = &section.stripped;
    if block.is_empty() {
        return text.clone();
    }
    match section.anchor {
        Some(at) => format!("{}{}{}", &text[..at], block, &text[at..]),
        None => match package_line_end(text) {
            Some(end) => format!("{}\n\n{}{}", &text[..end], block, &text[end..]),
            None if text.trim().is_empty() => block.to_string(),
            None => format!("{}\n\n{}", block, text),
        },
    }
}

fn package_line_end(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if is_package_line(line) {
            return Some(offset + line.trim_end_matches(['\r', '\n']).len());
        }
        offset += line.len();
    }
    None
}

/// Drops declarations from `fragment` whose exact text already exists in
/// `target`. Same-name functions with different text are kept and reported.
fn without_known_declarations(fragment: &str, target: &str) -> String {
    let target_names: BTreeSet<String> = scanner::scan(target, Path::new(""))
        .into_iter()
        .map(|r| r.name)
        .collect();

    let mut out = fragment.to_string();
    for record in scanner::scan(fragment, Path::new("")).iter().rev() {
        if target.contains(&record.full_text) {
            out.replace_range(span_with_doc(fragment, record), "");
        } else if target_names.contains(&record.name) {
            warn!("merged fragment defines {} more than once", record.name);
        }
    }

    let known = declaration_chunks(target);
    let duplicates: Vec<Range<usize>> = top_level_chunks(&out)
        .into_iter()
        .filter(|chunk| known.contains(out[chunk.clone()].trim()))
        .collect();
    for chunk in duplicates.into_iter().rev() {
        out.replace_range(chunk, "");
    }
    out
}

/// Top-level chunks of `text` once every function is cut out: type, var and
/// const declarations and free-standing comments.
fn declaration_chunks(text: &str) -> BTreeSet<String> {
    let mut residue = text.to_string();
    for record in scanner::scan(text, Path::new("")).iter().rev() {
        residue.replace_range(span_with_doc(text, record), "\n\n");
    }
    top_level_chunks(&residue)
        .into_iter()
        .map(|chunk| residue[chunk].trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Byte ranges of the runs of lines separated by blank lines at nesting
/// depth zero.
fn top_level_chunks(text: &str) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0i32;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if depth == 0 && line.trim().is_empty() {
            if let Some(from) = start.take() {
                chunks.push(from..offset);
            }
        } else {
            start.get_or_insert(offset);
            depth = (depth + nesting_delta(line)).max(0);
        }
        offset += line.len();
    }
    if let Some(from) = start {
        chunks.push(from..text.len());
    }
    chunks
}

/// Net bracket depth change of one line, ignoring literals and `//` comments.
fn nesting_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && q != '`' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '/' if chars.peek() == Some(&'/') => break,
                '{' | '(' | '[' => delta += 1,
                '}' | ')' | ']' => delta -= 1,
                _ => {}
            },
        }
    }
    delta
}

/// Drops import entries whose package identifier is never referenced.
///
/// Only entries whose identifier is certain are considered: an explicit alias,
/// or a plain lowercase last path segment that is not a major version
/// (`/v2`). Blank and dot imports are always kept.
pub fn prune_unused_imports(fragment: &str) -> String {
    let section = ImportSection::parse(fragment);
    if section.entries.is_empty() {
        return fragment.to_string();
    }

    let kept: BTreeSet<String> = section
        .entries
        .iter()
        .filter(|entry| match import_identifier(entry) {
            Some(ident) => {
                let used = Regex::new(&format!(r"\b{}\.", regex::escape(&ident)))
                    .map(|re| re.is_match(&section.stripped))
                    .unwrap_or(true);
                if !used {
                    debug!("pruning unused import {}", entry);
                }
                used
            }
            None => true,
        })
        .cloned()
        .collect();

    if kept.len() == section.entries.len() {
        return fragment.to_string();
    }
    tidy(&splice_imports(&section, &render_import_block(&kept)))
}

fn import_identifier(entry: &str) -> Option<String> {
    let (alias, path) = match entry.split_once(char::is_whitespace) {
        Some((alias, rest)) => (Some(alias.trim()), rest.trim()),
        None => (None, entry.trim()),
    };
    match alias {
        Some("_") | Some(".") => None,
        Some(alias) => Some(alias.to_string()),
        None => {
            let path = path.split("//").next().unwrap_or(path).trim().trim_matches('"');
            let last = path.rsplit('/').next()?;
            let is_version = last.len() > 1
                && last.starts_with('v')
                && last[1..].chars().all(|c| c.is_ascii_digit());
            let plain = !last.is_empty()
                && last.chars().next().is_some_and(|c| c.is_ascii_lowercase())
                && last.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            (plain && !is_version).then(|| last.to_string())
        }
    }
}

fn tidy(text: &str) -> String {
    let collapsed = blank_run_re().replace_all(text, "\n\n");
    let mut out = collapsed.trim_end().to_string();
    out.push('\n');
    out
}
