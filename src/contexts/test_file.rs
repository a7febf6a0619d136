use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::merge::{self, MergeOptions};
use super::synthesizer::{self, BOOTSTRAP_FUNCTION};
use crate::data::package_name_for;
use crate::error::PipelineError;

const TEST_SUFFIX: &str = "_test";
const BOOTSTRAP_MARKER: &str = "func TestMain(";

/// `dir/name.go` becomes `dir/name_test.go`.
pub fn test_file_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, TEST_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, TEST_SUFFIX),
    };
    source.with_file_name(file_name)
}

/// Whether any test file of `dir` already declares the suite entry point.
pub fn has_bootstrap_in_dir(dir: &Path) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_test_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_test.go"));
        if !is_test_file {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) if content.contains(BOOTSTRAP_MARKER) => return true,
            Ok(_) => {}
            Err(e) => error!("could not read {}: {}", path.display(), e),
        }
    }
    false
}

/// Writes `fragment` as the current test of `function_name` into `test_path`.
///
/// An existing test file is merged with the fragment, replacing any earlier
/// definition of the same test. A new file gets the package of its directory.
/// The suite entry point is added only when no test file in the directory
/// declares one, and is stripped from the fragment when one already exists.
/// Returns the text written.
pub fn save_test(test_path: &Path, fragment: &str, function_name: &str) -> Result<String, PipelineError> {
    let dir = match test_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let test_name = synthesizer::test_function_name(function_name);
    let dir_has_bootstrap = has_bootstrap_in_dir(dir);

    let fragment = if dir_has_bootstrap && merge::has_function(fragment, BOOTSTRAP_FUNCTION) {
        debug!("{} already has {}, dropping it from the candidate", dir.display(), BOOTSTRAP_FUNCTION);
        merge::remove_function(fragment, BOOTSTRAP_FUNCTION)
    } else {
        fragment.to_string()
    };
    let needs_bootstrap = !dir_has_bootstrap && !merge::has_function(&fragment, BOOTSTRAP_FUNCTION);

    let content = if test_path.exists() {
        let existing = fs::read_to_string(test_path).map_err(|e| PipelineError::io(test_path, e))?;
        let mut merged = merge::merge(&existing, &fragment, &MergeOptions::replacing(&test_name));
        if needs_bootstrap {
            merged = merge::merge(&merged, &synthesizer::bootstrap(None), &MergeOptions::default());
        }
        merged
    } else {
        let package = package_name_for(test_path);
        let base = if needs_bootstrap {
            synthesizer::bootstrap(Some(&package))
        } else {
            format!("package {}\n", package)
        };
        merge::merge(&base, &fragment, &MergeOptions::default())
    };
    let content = merge::prune_unused_imports(&content);

    fs::write(test_path, &content).map_err(|e| PipelineError::io(test_path, e))?;
    info!("wrote {} to {}", test_name, test_path.display());
    Ok(content)
}
