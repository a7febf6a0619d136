use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::error::RunnerError;

/// Result of one test-runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunnerOutcome {
    /// `None` when the process was killed before it exited.
    pub exit_code: Option<i32>,
    /// stdout followed by stderr.
    pub combined_output: String,
}

impl RunnerOutcome {
    pub fn new(exit_code: Option<i32>, combined_output: impl Into<String>) -> Self {
        Self {
            exit_code,
            combined_output: combined_output.into(),
        }
    }

    /// A run passes only if the process exited with 0 *and* printed the pass
    /// marker. The runner may swallow failures and still exit cleanly.
    pub fn passed(&self, pass_marker: &str) -> bool {
        self.exit_code == Some(0) && self.combined_output.contains(pass_marker)
    }
}

/// Executes a selection of tests and reports what happened.
pub trait TestRunner {
    /// Runs the tests matching `selector` inside `working_dir`.
    ///
    /// The implementation owns the hard kill on `timeout`; a timed-out run is
    /// reported as [`RunnerError::Timeout`].
    fn run(
        &self,
        working_dir: &Path,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<RunnerOutcome, RunnerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_without_marker_is_not_a_pass() {
        let outcome = RunnerOutcome::new(Some(0), "no tests to run");
        assert!(!outcome.passed("PASS"));
    }

    #[test]
    fn marker_with_failing_exit_is_not_a_pass() {
        let outcome = RunnerOutcome::new(Some(1), "--- FAIL\nPASS");
        assert!(!outcome.passed("PASS"));
    }

    #[test]
    fn zero_exit_with_marker_passes() {
        let outcome = RunnerOutcome::new(Some(0), "=== RUN   TestAdd\nPASS\nok");
        assert!(outcome.passed("PASS"));
    }
}
