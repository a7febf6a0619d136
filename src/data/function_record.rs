use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// One function declaration discovered in a source file.
///
/// Records are built fresh on every scan and never mutated afterwards. The
/// pair `(file_path, name)` is the only identity a record has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    /// Method receiver text without the parentheses, empty for plain functions.
    pub receiver: String,
    pub parameter_text: String,
    /// Everything between the parameter list and the opening brace.
    pub signature_text: String,
    pub body_text: String,
    pub full_text: String,
    /// Byte range of `full_text` inside the scanned source.
    pub span: Range<usize>,
    /// Byte range strictly between the braces, before trimming.
    pub body_span: Range<usize>,
    pub file_path: PathBuf,
    pub doc_comment: String,
    pub tags: Vec<String>,
}

impl FunctionRecord {
    /// Name of the directory containing the source file, used as the Go package
    /// name of the generated test file.
    pub fn package_name(&self) -> String {
        package_name_for(&self.file_path)
    }

    pub fn is_method(&self) -> bool {
        !self.receiver.is_empty()
    }
}

pub(crate) fn package_name_for(path: &Path) -> String {
    path.parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "main".to_string())
}
