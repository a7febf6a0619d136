use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::data::{RunnerOutcome, TestRunner};
use crate::error::RunnerError;

/// Runs `go test -run <selector> -v` in the test's directory.
#[derive(Debug, Clone)]
pub struct GoTestRunner {
    program: String,
}

impl Default for GoTestRunner {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoTestRunner {
    /// `program` is the `go` executable to invoke.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(selector: &str, timeout: Duration) -> Vec<String> {
        vec![
            "test".to_string(),
            "-timeout".to_string(),
            format!("{}s", timeout.as_secs().max(1)),
            "-run".to_string(),
            selector.to_string(),
            "-v".to_string(),
        ]
    }
}

impl TestRunner for GoTestRunner {
    async fn run(&self, working_dir: &Path, selector: &str, timeout: Duration) -> Result<RunnerOutcome, RunnerError> {
        let args = Self::args(selector, timeout);
        debug!("{}: {} {}", working_dir.display(), self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Spawn(format!("{}: {}", self.program, e)))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| RunnerError::Spawn(format!("{}: {}", self.program, e)))?,
            Err(_) => return Err(RunnerError::Timeout(timeout.as_secs().max(1))),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(RunnerOutcome::new(output.status.code(), combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_selects_one_test() {
        let args = GoTestRunner::args("^TestAdd$", Duration::from_secs(30));
        assert_eq!(args, vec!["test", "-timeout", "30s", "-run", "^TestAdd$", "-v"]);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = GoTestRunner::new("testsmith-no-such-go");
        let err = runner
            .run(Path::new("."), "^TestAdd$", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn(_)));
    }

    /// `sh` runs the script named `test` in the working directory, so the
    /// fake runner sees the remaining arguments as `$1..$5`.
    #[cfg(unix)]
    fn fake_go(body: &str) -> tempfile::TempDir {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("test"), body).unwrap();
        tmp
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_process_is_killed_at_timeout() {
        let tmp = fake_go("sleep 5\n");
        let runner = GoTestRunner::new("sh");
        let err = runner
            .run(tmp.path(), "^TestAdd$", Duration::from_millis(300))
            .await
            .unwrap_err();
        assert_eq!(err, RunnerError::Timeout(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_streams_are_combined() {
        let tmp = fake_go("echo \"=== RUN   $4\"\necho PASS\necho warn >&2\n");
        let runner = GoTestRunner::new("sh");
        let outcome = runner.run(tmp.path(), "^TestAdd$", Duration::from_secs(10)).await.unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.combined_output, "=== RUN   ^TestAdd$\nPASS\nwarn\n");
        assert!(outcome.passed("PASS"));
    }
}
