use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::RunnerOutcome;

/// States of the generate-validate-debug controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    ScanFail,
    Synthesize,
    Enrich,
    Validate,
    Debug,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::ScanFail | PipelineState::Succeeded | PipelineState::Failed
        )
    }
}

/// One validate cycle of the debug loop.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineAttempt {
    pub attempt_number: usize,
    pub candidate_code: String,
    pub outcome: RunnerOutcome,
    pub passed: bool,
    /// Debug response produced after this attempt failed, if any.
    pub oracle_output: Option<String>,
}

/// Terminal result of the validate/debug loop for one unit.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub state: PipelineState,
    pub attempts: usize,
    pub last_output: String,
    pub final_candidate: String,
    pub error: Option<String>,
    pub history: Vec<PipelineAttempt>,
}

impl ValidationReport {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Succeeded
    }
}

/// User-visible status of one `(file, function)` unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// The test was generated, saved and passed validation.
    Success,
    /// The test was saved but validation or debugging did not converge.
    SuccessWithWarning,
    /// Nothing could be generated (missing file or function).
    Failed,
    /// The scaffold was generated but could not be saved.
    PartiallyFailed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            UnitStatus::Success => "success",
            UnitStatus::SuccessWithWarning => "success_with_warning",
            UnitStatus::Failed => "failed",
            UnitStatus::PartiallyFailed => "partially_failed",
        };
        f.write_str(s)
    }
}

/// Result record every unit yields, whatever happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub function_name: String,
    pub file_path: PathBuf,
    pub test_file_path: Option<PathBuf>,
    pub status: UnitStatus,
    /// Controller state the unit ended in.
    pub state: PipelineState,
    pub error: Option<String>,
    pub attempts: usize,
    pub last_output: Option<String>,
    /// Scaffold text, kept only when it could not be written to disk.
    pub scaffold: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl UnitReport {
    pub fn failed(function_name: &str, file_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            function_name: function_name.to_string(),
            file_path,
            test_file_path: None,
            status: UnitStatus::Failed,
            state: PipelineState::ScanFail,
            error: Some(error.into()),
            attempts: 0,
            last_output: None,
            scaffold: None,
            finished_at: Utc::now(),
        }
    }

    pub fn partially_failed(
        function_name: &str,
        file_path: PathBuf,
        error: impl Into<String>,
        scaffold: String,
    ) -> Self {
        Self {
            status: UnitStatus::PartiallyFailed,
            state: PipelineState::Failed,
            scaffold: Some(scaffold),
            ..Self::failed(function_name, file_path, error)
        }
    }

    pub fn from_validation(
        function_name: &str,
        file_path: PathBuf,
        test_file_path: PathBuf,
        validation: &ValidationReport,
    ) -> Self {
        let status = if validation.succeeded() {
            UnitStatus::Success
        } else {
            UnitStatus::SuccessWithWarning
        };
        Self {
            function_name: function_name.to_string(),
            file_path,
            test_file_path: Some(test_file_path),
            status,
            state: validation.state,
            error: validation.error.clone(),
            attempts: validation.attempts,
            last_output: Some(validation.last_output.clone()),
            scaffold: None,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == UnitStatus::Success
    }

    /// One-line summary printed by the CLI.
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{} {} ({})",
            self.status,
            self.function_name,
            self.file_path.display()
        );
        if let Some(path) = &self.test_file_path {
            line.push_str(&format!(" -> {}", path.display()));
        }
        if self.attempts > 0 {
            line.push_str(&format!(" [attempts: {}]", self.attempts));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(": {}", error));
        }
        line
    }
}
