//! Generate-validate-debug controller.
//!
//! One unit is one `(source file, function)` pair. The controller scans the
//! file, writes a synthesized scaffold next to it, optionally asks the enrich
//! oracle to fill the scaffold in, then alternates between running the test
//! and asking the debug oracle for a fix until the test passes or the attempt
//! budget is spent.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cleanup::clean_generated_code;
use super::merge::{self, MergeOptions};
use super::scanner;
use super::synthesizer::{self, ScaffoldTemplate};
use super::test_file;
use crate::data::{
    CodeOracle, FunctionRecord, PipelineAttempt, PipelineState, RunnerOutcome, TestRunner, UnitReport,
    ValidationReport,
};
use crate::error::{OracleError, PipelineError};
use crate::prompts;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;
pub const DEFAULT_RUNNER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PASS_MARKER: &str = "PASS";

/// Function name reported when a whole file could not be scanned.
pub const WHOLE_FILE: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on validate cycles per unit, the first run included.
    pub max_attempts: usize,
    pub runner_timeout: Duration,
    /// Text the runner output must contain for a run to count as passed.
    pub pass_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            runner_timeout: DEFAULT_RUNNER_TIMEOUT,
            pass_marker: DEFAULT_PASS_MARKER.to_string(),
        }
    }
}

/// Which scaffold case the enrich oracle should fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseType {
    Fail,
    Success,
    #[default]
    Both,
}

impl FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(CaseType::Fail),
            "success" => Ok(CaseType::Success),
            "both" => Ok(CaseType::Both),
            other => Err(format!("unknown case type '{}', expected fail, success or both", other)),
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CaseType::Fail => "fail",
            CaseType::Success => "success",
            CaseType::Both => "both",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOptions {
    /// Ask the enrich oracle to fill in the scaffold before validating.
    pub enrich: bool,
    pub case_type: CaseType,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            enrich: true,
            case_type: CaseType::default(),
        }
    }
}

pub struct Pipeline<O, R>
where
    O: CodeOracle,
    R: TestRunner,
{
    config: PipelineConfig,
    template: ScaffoldTemplate,
    enrich_oracle: O,
    debug_oracle: O,
    runner: R,
}

impl<O, R> Pipeline<O, R>
where
    O: CodeOracle,
    R: TestRunner,
{
    pub fn new(config: PipelineConfig, template: ScaffoldTemplate, enrich_oracle: O, debug_oracle: O, runner: R) -> Self {
        Self {
            config,
            template,
            enrich_oracle,
            debug_oracle,
            runner,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the whole pipeline for one function of one file.
    ///
    /// Never fails: every outcome, including a missing file or function, is
    /// described by the returned report.
    pub async fn run_unit(&self, source: &Path, function_name: &str, options: UnitOptions) -> UnitReport {
        let records = match scanner::scan_file(source) {
            Ok(records) => records,
            Err(e) => {
                error!("{}", e);
                return UnitReport::failed(function_name, source.to_path_buf(), e.to_string());
            }
        };
        match scanner::find_function(&records, function_name) {
            Some(record) => self.run_record(record, options).await,
            None => {
                let e = PipelineError::NotFound(format!(
                    "function {} in {}",
                    function_name,
                    source.display()
                ));
                error!("{}", e);
                UnitReport::failed(function_name, source.to_path_buf(), e.to_string())
            }
        }
    }

    /// Runs every function of `source`, one after the other.
    ///
    /// Functions sharing a name (methods on different receivers) would share
    /// one test name, so only the first of them is processed.
    pub async fn run_file(&self, source: &Path, options: UnitOptions) -> Vec<UnitReport> {
        let records = match scanner::scan_file(source) {
            Ok(records) => records,
            Err(e) => {
                error!("{}", e);
                return vec![UnitReport::failed(WHOLE_FILE, source.to_path_buf(), e.to_string())];
            }
        };
        info!("{}: {} function(s) to process", source.display(), records.len());

        let mut reports = Vec::with_capacity(records.len());
        let mut seen: Vec<&str> = Vec::new();
        for record in &records {
            if seen.contains(&record.name.as_str()) {
                warn!(
                    "{} declares {} more than once, skipping the later definition",
                    source.display(),
                    record.name
                );
                continue;
            }
            seen.push(&record.name);
            reports.push(self.run_record(record, options).await);
        }
        reports
    }

    /// Runs every source file under `dir`, one after the other.
    pub async fn run_directory(&self, dir: &Path, options: UnitOptions) -> Vec<UnitReport> {
        let files = scanner::find_source_files(dir);
        info!("{}: {} source file(s) found", dir.display(), files.len());

        let mut reports = Vec::new();
        for file in files {
            reports.extend(self.run_file(&file, options).await);
        }
        reports
    }

    /// Drives one unit from `Synthesize` to the start of validation.
    async fn run_record(&self, record: &FunctionRecord, options: UnitOptions) -> UnitReport {
        let source = record.file_path.clone();
        let test_path = test_file::test_file_path(&source);
        info!("generating test for {} ({})", record.name, source.display());

        let mut state = PipelineState::Synthesize;
        let mut candidate = String::new();
        while state != PipelineState::Validate {
            state = match state {
                PipelineState::Synthesize => {
                    let scaffold = synthesizer::synthesize(record, &self.template);
                    if let Err(e) = test_file::save_test(&test_path, &scaffold, &record.name) {
                        error!("could not save scaffold for {}: {}", record.name, e);
                        return UnitReport::partially_failed(&record.name, source, e.to_string(), scaffold);
                    }
                    candidate = scaffold;
                    if options.enrich {
                        PipelineState::Enrich
                    } else {
                        PipelineState::Validate
                    }
                }
                PipelineState::Enrich => {
                    candidate = self.enrich(record, &candidate, options.case_type).await;
                    PipelineState::Validate
                }
                other => {
                    debug!("unit {} entered in state {:?}", record.name, other);
                    PipelineState::Validate
                }
            };
        }

        let validation = self.validate_and_debug(&test_path, &record.name, candidate).await;
        UnitReport::from_validation(&record.name, source, test_path, &validation)
    }

    /// Asks the enrich oracle to fill in the scaffold.
    ///
    /// Any failure yields the scaffold unchanged.
    async fn enrich(&self, record: &FunctionRecord, scaffold: &str, case_type: CaseType) -> String {
        let test_name = synthesizer::test_function_name(&record.name);
        let prompt = prompts::enrich_prompt(&record.name, &record.full_text, scaffold, case_type);

        let cleaned = match self.enrich_oracle.generate(&prompt).await {
            Ok(response) => defining_test(&response, &test_name),
            Err(e) => Err(e),
        };
        match cleaned {
            Ok(cleaned) => {
                debug!("enriched {} ({} bytes)", test_name, cleaned.len());
                merge::merge(scaffold, &cleaned, &MergeOptions::replacing(&test_name))
            }
            Err(e) => {
                warn!("enrichment of {} failed, keeping the scaffold: {}", record.name, e);
                scaffold.to_string()
            }
        }
    }

    /// Validate/debug loop for one test.
    ///
    /// Each validate cycle writes the candidate, runs the test and counts as
    /// one attempt. After a failed cycle the debug oracle proposes a new
    /// candidate, unless the budget is spent. A debug oracle failure ends the
    /// loop at once.
    pub async fn validate_and_debug(&self, test_path: &Path, function_name: &str, candidate: String) -> ValidationReport {
        let max_attempts = self.config.max_attempts.max(1);
        let working_dir = working_dir_of(test_path);
        let test_name = synthesizer::test_function_name(function_name);
        let selector = format!("^{}$", test_name);

        let mut state = PipelineState::Validate;
        let mut attempt = 0;
        let mut candidate = candidate;
        let mut last_output = String::new();
        let mut error: Option<String> = None;
        let mut history: Vec<PipelineAttempt> = Vec::new();

        while !state.is_terminal() {
            state = match state {
                PipelineState::Validate => {
                    attempt += 1;
                    info!("{}: attempt {}/{}", function_name, attempt, max_attempts);

                    if let Err(e) = test_file::save_test(test_path, &candidate, function_name) {
                        error!("{}", e);
                        error = Some(e.to_string());
                        PipelineState::Failed
                    } else {
                        let outcome = self.run_tests(&working_dir, &selector).await;
                        let passed = outcome.passed(&self.config.pass_marker);
                        last_output = outcome.combined_output.clone();
                        history.push(PipelineAttempt {
                            attempt_number: attempt,
                            candidate_code: candidate.clone(),
                            outcome,
                            passed,
                            oracle_output: None,
                        });

                        if passed {
                            info!("{} passed on attempt {}", function_name, attempt);
                            PipelineState::Succeeded
                        } else if attempt < max_attempts {
                            PipelineState::Debug
                        } else {
                            let e = PipelineError::BudgetExhausted(max_attempts);
                            warn!("{}: {}", function_name, e);
                            error = Some(e.to_string());
                            PipelineState::Failed
                        }
                    }
                }
                PipelineState::Debug => {
                    let prompt = prompts::debug_prompt(function_name, &candidate, &last_output);
                    let response = match self.debug_oracle.generate(&prompt).await {
                        Ok(response) => {
                            if let Some(last) = history.last_mut() {
                                last.oracle_output = Some(response.clone());
                            }
                            defining_test(&response, &test_name)
                        }
                        Err(e) => Err(e),
                    };
                    match response {
                        Ok(cleaned) => {
                            debug!("{}: debug oracle proposed a new candidate", function_name);
                            candidate = cleaned;
                            PipelineState::Validate
                        }
                        Err(e) => {
                            let e = PipelineError::from(e);
                            warn!("{}: debugging stopped: {}", function_name, e);
                            error = Some(e.to_string());
                            PipelineState::Failed
                        }
                    }
                }
                other => {
                    debug!("validation loop entered in state {:?}", other);
                    PipelineState::Failed
                }
            };
        }

        ValidationReport {
            state,
            attempts: attempt,
            last_output,
            final_candidate: candidate,
            error,
            history,
        }
    }

    /// Runner failures count as a failed run whose output is the error.
    async fn run_tests(&self, working_dir: &Path, selector: &str) -> RunnerOutcome {
        match self.runner.run(working_dir, selector, self.config.runner_timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = PipelineError::from(e);
                warn!("{}", e);
                RunnerOutcome::new(None, e.to_string())
            }
        }
    }
}

/// Cleaned oracle response, accepted only when it still declares `test_name`.
fn defining_test(response: &str, test_name: &str) -> Result<String, OracleError> {
    let cleaned = clean_generated_code(response);
    if cleaned.trim().is_empty() {
        Err(OracleError::EmptyResponse)
    } else if !merge::has_function(&cleaned, test_name) {
        Err(OracleError::MissingTest(test_name.to_string()))
    } else {
        Ok(cleaned)
    }
}

fn working_dir_of(test_path: &Path) -> PathBuf {
    match test_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
