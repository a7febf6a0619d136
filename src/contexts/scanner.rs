//! Structural scanner for Go source files.
//!
//! Function boundaries are found with a declaration pattern plus a naive
//! depth-counting brace matcher, not with a grammar. Known blind spots:
//!
//! - braces inside string/rune literals and comments are counted like
//!   structural braces, so an unbalanced brace in a literal shifts the match;
//! - the parameter list is captured non-greedily up to the first `)`, so a
//!   parameter of function type (`cb func(int) error`) splits at the wrong
//!   parenthesis, and a return type containing `{` (`interface{}`) ends the
//!   signature early.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::data::FunctionRecord;
use crate::error::PipelineError;

const DECLARATION_KEYWORD: &str = "func";
const TAGS_DIRECTIVE: &str = "@apitags";

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // receiver, name, optional type parameters, parameters, signature up to `{`
        Regex::new(r"(?s)\bfunc\s+(?:\(([^)]*)\)\s*)?(\w+)\s*(?:\[[^\]]*\]\s*)?\((.*?)\)\s*([^{]*?)\{")
            .expect("valid regex")
    })
}

fn doc_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ms)/\*.*?\*/|(?:^[ \t]*//[^\n]*(?:\n|\z))+").expect("valid regex")
    })
}

fn tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@apitags[ \t]+([\w\-]+(?:[ \t]*,[ \t]*[\w\-]+|[ \t]+[\w\-]+)*)")
            .expect("valid regex")
    })
}

/// A documentation block that directly precedes a declaration keyword.
#[derive(Debug, Clone)]
struct DocBlock {
    end: usize,
    text: String,
}

/// Extracts every function declaration from `source`.
///
/// Never fails: a declaration whose body is not terminated before the end of
/// the text is skipped with a warning and scanning continues.
pub fn scan(source: &str, file_path: &Path) -> Vec<FunctionRecord> {
    let docs = doc_blocks(source);
    let mut records = Vec::new();

    for caps in declaration_re().captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let receiver = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let params = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
        let signature = caps.get(4).map(|m| m.as_str().trim()).unwrap_or_default();

        let start = whole.start();
        let body_start = whole.end();
        let Some(close) = find_matching_brace(source, body_start) else {
            warn!("{}, skipping", unmatched_brace(file_path, name));
            continue;
        };

        let doc_comment = nearest_doc(source, &docs, start);
        let tags = extract_tags(&doc_comment);

        records.push(FunctionRecord {
            name: name.to_string(),
            receiver: receiver.to_string(),
            parameter_text: params.to_string(),
            signature_text: signature.to_string(),
            body_text: source[body_start..close].trim().to_string(),
            full_text: source[start..=close].to_string(),
            span: start..close + 1,
            body_span: body_start..close,
            file_path: file_path.to_path_buf(),
            doc_comment,
            tags,
        });
    }

    debug!("{}: found {} function(s)", file_path.display(), records.len());
    records
}

fn unmatched_brace(file_path: &Path, name: &str) -> PipelineError {
    PipelineError::MalformedSource {
        path: file_path.to_path_buf(),
        detail: format!("function {} has no matching closing brace", name),
    }
}

/// Reads and scans one file.
pub fn scan_file(path: &Path) -> Result<Vec<FunctionRecord>, PipelineError> {
    let source = fs::read_to_string(path)
        .map_err(|e| PipelineError::NotFound(format!("{}: {}", path.display(), e)))?;
    Ok(scan(&source, path))
}

/// Returns the first record named `name`.
pub fn find_function<'a>(records: &'a [FunctionRecord], name: &str) -> Option<&'a FunctionRecord> {
    records.iter().find(|r| r.name == name)
}

/// Full declaration text of `name` in `path`, or an empty string when either
/// the file or the function cannot be found.
pub fn function_code(path: &Path, name: &str) -> String {
    match scan_file(path) {
        Ok(records) => match find_function(&records, name) {
            Some(record) => record.full_text.clone(),
            None => {
                warn!("function {} not found in {}", name, path.display());
                String::new()
            }
        },
        Err(e) => {
            warn!("failed to read function {}: {}", name, e);
            String::new()
        }
    }
}

/// Every non-test Go source file under `dir`, sorted.
pub fn find_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_source_file(path))
        .collect();
    files.sort();
    files
}

/// Scans every source file under `dir`. Unreadable files are logged and skipped.
pub fn scan_directory(dir: &Path) -> Vec<FunctionRecord> {
    let mut all = Vec::new();
    for file in find_source_files(dir) {
        match scan_file(&file) {
            Ok(records) => all.extend(records),
            Err(e) => warn!("skipping {}: {}", file.display(), e),
        }
    }
    all
}

fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".go") && !name.ends_with("_test.go")
}

/// Finds the brace closing the block whose opening brace sits right before
/// `after_open`. Returns the byte index of the closing brace.
pub fn find_matching_brace(text: &str, after_open: usize) -> Option<usize> {
    find_matching(text, after_open, b'{', b'}')
}

/// Depth counter shared by the scanner and the merge engine. Depth starts at 1
/// at `after_open`; the match is where it returns to 0.
pub(crate) fn find_matching(text: &str, after_open: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    for (i, &b) in bytes.iter().enumerate().skip(after_open) {
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn doc_blocks(source: &str) -> Vec<DocBlock> {
    doc_block_re()
        .find_iter(source)
        .filter(|m| followed_by_declaration(&source[m.end()..]))
        .map(|m| DocBlock {
            end: m.end(),
            text: m.as_str().trim().to_string(),
        })
        .collect()
}

fn followed_by_declaration(rest: &str) -> bool {
    let rest = rest.trim_start();
    match rest.strip_prefix(DECLARATION_KEYWORD) {
        Some(after) => after.starts_with(|c: char| c.is_whitespace() || c == '('),
        None => false,
    }
}

/// Nearest block ending at or before `start` with only whitespace in between.
fn nearest_doc(source: &str, docs: &[DocBlock], start: usize) -> String {
    docs.iter()
        .filter(|d| d.end <= start)
        .max_by_key(|d| d.end)
        .filter(|d| source[d.end..start].trim().is_empty())
        .map(|d| d.text.clone())
        .unwrap_or_default()
}

/// Tokens following the `@apitags` directive, split on commas and whitespace.
pub fn extract_tags(doc_comment: &str) -> Vec<String> {
    if !doc_comment.contains(TAGS_DIRECTIVE) {
        return Vec::new();
    }
    tags_re()
        .captures(doc_comment)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
