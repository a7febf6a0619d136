use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a code oracle backend.
///
/// Every transport, authentication or rate-limit problem ends up in one of
/// these variants so callers can apply the same fallback regardless of the
/// backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle backend unavailable: {0}")]
    Unavailable(String),
    #[error("oracle request failed: {0}")]
    RequestFailed(String),
    #[error("oracle returned an empty response")]
    EmptyResponse,
    #[error("oracle response does not define {0}")]
    MissingTest(String),
    #[error("oracle backend '{0}' is not configured")]
    NotConfigured(String),
}

/// Errors raised while invoking the test runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("test run timed out after {0}s")]
    Timeout(u64),
    #[error("failed to execute test command: {0}")]
    Spawn(String),
}

/// Failure taxonomy of the generate-validate-debug pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed source in {path}: {detail}")]
    MalformedSource { path: PathBuf, detail: String },
    #[error(transparent)]
    OracleUnavailable(#[from] OracleError),
    #[error("test runner timed out after {0}s")]
    RunnerTimeout(u64),
    #[error("test runner reported failure: {0}")]
    RunnerFailure(String),
    #[error("max attempts exhausted ({0}) without a passing run")]
    BudgetExhausted(usize),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<RunnerError> for PipelineError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Timeout(secs) => PipelineError::RunnerTimeout(secs),
            RunnerError::Spawn(detail) => PipelineError::RunnerFailure(detail),
        }
    }
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
