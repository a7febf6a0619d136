// Controller behaviour against scripted oracles and runners.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use testsmith::contexts::synthesizer::{self, ScaffoldTemplate};
use testsmith::contexts::{CaseType, Pipeline, PipelineConfig, UnitOptions, scanner};
use testsmith::data::{CodeOracle, PipelineState, RunnerOutcome, TestRunner, UnitStatus};
use testsmith::error::{OracleError, RunnerError};

const CALC_SOURCE: &str = r#"package calc

// Add returns the sum of a and b.
// @apitags math, basic
func Add(a, b int) int {
	return a + b
}

func Sub(a, b int) int {
	return a - b
}
"#;

const FIXED_TEST: &str = "```go\nfunc TestAdd(t *testing.T) {\n\tt.Log(\"fixed\")\n}\n```\nThe assertion now matches.";

#[derive(Clone, Default)]
struct ScriptedOracle {
    responses: Arc<Mutex<VecDeque<Result<String, OracleError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOracle {
    fn new(responses: Vec<Result<String, OracleError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            prompts: Arc::default(),
        }
    }

    fn always(response: &str, times: usize) -> Self {
        Self::new(vec![Ok(response.to_string()); times])
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CodeOracle for ScriptedOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".to_string())))
    }
}

#[derive(Clone, Default)]
struct ScriptedRunner {
    outcomes: Arc<Mutex<VecDeque<Result<RunnerOutcome, RunnerError>>>>,
    calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl ScriptedRunner {
    fn new(outcomes: Vec<Result<RunnerOutcome, RunnerError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TestRunner for ScriptedRunner {
    async fn run(&self, working_dir: &Path, selector: &str, _timeout: Duration) -> Result<RunnerOutcome, RunnerError> {
        self.calls
            .lock()
            .unwrap()
            .push((working_dir.to_path_buf(), selector.to_string()));
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(failing()))
    }
}

fn passing() -> RunnerOutcome {
    RunnerOutcome::new(Some(0), "=== RUN   TestAdd\n--- PASS: TestAdd (0.00s)\nPASS\nok  \tcalc\t0.01s\n")
}

fn failing() -> RunnerOutcome {
    RunnerOutcome::new(Some(1), "=== RUN   TestAdd\n--- FAIL: TestAdd (0.00s)\nFAIL\n")
}

fn calc_project() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("calc");
    fs::create_dir(&dir).unwrap();
    let source = dir.join("calc.go");
    fs::write(&source, CALC_SOURCE).unwrap();
    (tmp, source)
}

fn pipeline(
    enrich: &ScriptedOracle,
    debug: &ScriptedOracle,
    runner: &ScriptedRunner,
) -> Pipeline<ScriptedOracle, ScriptedRunner> {
    Pipeline::new(
        PipelineConfig::default(),
        ScaffoldTemplate::default(),
        enrich.clone(),
        debug.clone(),
        runner.clone(),
    )
}

fn no_enrich() -> UnitOptions {
    UnitOptions {
        enrich: false,
        case_type: CaseType::Both,
    }
}

fn scaffold_for(source: &Path, name: &str) -> String {
    let records = scanner::scan_file(source).unwrap();
    let record = scanner::find_function(&records, name).unwrap();
    synthesizer::synthesize(record, &ScaffoldTemplate::default())
}

#[tokio::test]
async fn passes_on_third_attempt_after_two_debug_rounds() {
    let (_tmp, source) = calc_project();
    let enrich = ScriptedOracle::default();
    let debug = ScriptedOracle::always(FIXED_TEST, 2);
    let runner = ScriptedRunner::new(vec![Ok(failing()), Ok(failing()), Ok(passing())]);

    let report = pipeline(&enrich, &debug, &runner).run_unit(&source, "Add", no_enrich()).await;

    assert_eq!(report.status, UnitStatus::Success);
    assert_eq!(report.state, PipelineState::Succeeded);
    assert_eq!(report.attempts, 3);
    assert!(report.error.is_none());
    assert!(report.last_output.as_deref().unwrap().contains("PASS"));
    assert_eq!(debug.prompts().len(), 2);
    assert!(debug.prompts()[0].contains("--- FAIL: TestAdd"));

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(dir, selector)| dir == source.parent().unwrap() && selector == "^TestAdd$"));

    let written = fs::read_to_string(source.with_file_name("calc_test.go")).unwrap();
    assert_eq!(written.matches("func TestAdd(").count(), 1);
    assert!(written.contains("t.Log(\"fixed\")"));
    assert!(!written.contains("The assertion now matches"));
}

#[tokio::test]
async fn gives_up_after_max_attempts_with_last_output() {
    let (_tmp, source) = calc_project();
    let enrich = ScriptedOracle::default();
    let debug = ScriptedOracle::always(FIXED_TEST, 10);
    let runner = ScriptedRunner::default();
    let pipeline = pipeline(&enrich, &debug, &runner);

    let test_path = source.with_file_name("calc_test.go");
    let scaffold = scaffold_for(&source, "Add");
    let validation = pipeline.validate_and_debug(&test_path, "Add", scaffold).await;

    assert_eq!(validation.state, PipelineState::Failed);
    assert_eq!(validation.attempts, 5);
    assert_eq!(validation.history.len(), 5);
    assert_eq!(runner.calls().len(), 5);
    assert_eq!(debug.prompts().len(), 4);
    assert!(validation.last_output.contains("--- FAIL: TestAdd"));
    assert!(validation.error.as_deref().unwrap().contains("max attempts exhausted"));
    assert!(validation.history.iter().all(|attempt| !attempt.passed));
    assert!(validation.history[..4].iter().all(|attempt| attempt.oracle_output.is_some()));
    assert!(validation.history[4].oracle_output.is_none());
}

#[tokio::test]
async fn exhausted_budget_is_reported_as_warning() {
    let (_tmp, source) = calc_project();
    let debug = ScriptedOracle::always(FIXED_TEST, 10);
    let runner = ScriptedRunner::default();

    let report = pipeline(&ScriptedOracle::default(), &debug, &runner)
        .run_unit(&source, "Add", no_enrich())
        .await;

    assert_eq!(report.status, UnitStatus::SuccessWithWarning);
    assert_eq!(report.attempts, 5);
    assert_eq!(report.test_file_path, Some(source.with_file_name("calc_test.go")));
    assert!(report.last_output.as_deref().unwrap().contains("FAIL"));
}

#[tokio::test]
async fn enrichment_failure_validates_the_scaffold_unchanged() {
    let (_tmp, source) = calc_project();
    let enrich = ScriptedOracle::new(vec![Err(OracleError::RequestFailed("503".to_string()))]);
    let runner = ScriptedRunner::new(vec![Ok(passing())]);
    let scaffold = scaffold_for(&source, "Add");

    let report = pipeline(&enrich, &ScriptedOracle::default(), &runner)
        .run_unit(
            &source,
            "Add",
            UnitOptions {
                enrich: true,
                case_type: CaseType::Fail,
            },
        )
        .await;
    assert_eq!(report.status, UnitStatus::Success);
    assert_eq!(report.attempts, 1);

    let test_path = source.with_file_name("calc_test.go");
    let written = fs::read_to_string(&test_path).unwrap();
    let written_records = scanner::scan(&written, &test_path);
    let scaffold_records = scanner::scan(&scaffold, &test_path);
    assert_eq!(
        scanner::find_function(&written_records, "TestAdd").unwrap().full_text,
        scanner::find_function(&scaffold_records, "TestAdd").unwrap().full_text
    );

    let prompt = &enrich.prompts()[0];
    assert!(prompt.contains("func Add(a, b int) int {"));
    assert!(prompt.contains("Rules for failure_case"));
    assert!(!prompt.contains("Rules for success_case"));
}

#[tokio::test]
async fn enrichment_fallback_candidate_is_byte_identical() {
    let (_tmp, source) = calc_project();
    let scaffold = scaffold_for(&source, "Add");

    for response in [
        Ok("   ".to_string()),
        Ok("I cannot help with that.".to_string()),
        Err(OracleError::EmptyResponse),
    ] {
        let enrich = ScriptedOracle::new(vec![response]);
        let debug = ScriptedOracle::default();
        let runner = ScriptedRunner::new(vec![Ok(failing())]);
        let pipeline = Pipeline::new(
            PipelineConfig {
                max_attempts: 1,
                ..PipelineConfig::default()
            },
            ScaffoldTemplate::default(),
            enrich.clone(),
            debug.clone(),
            runner.clone(),
        );

        let report = pipeline.run_unit(&source, "Add", UnitOptions::default()).await;
        assert_eq!(report.status, UnitStatus::SuccessWithWarning);
        assert_eq!(report.attempts, 1);
        assert!(debug.prompts().is_empty());

        let written = fs::read_to_string(source.with_file_name("calc_test.go")).unwrap();
        assert!(written.contains(scaffold.split_once("func TestAdd").unwrap().1));
    }
}

#[tokio::test]
async fn enriched_test_replaces_scaffold_body() {
    let (_tmp, source) = calc_project();
    let enrich = ScriptedOracle::always(
        "Here is the completed test:\n```go\npackage calc\n\nimport (\n\t\"testing\"\n)\n\nfunc TestAdd(t *testing.T) {\n\tif Add(1, 2) != 3 {\n\t\tt.Fatal(\"bad sum\")\n\t}\n}\n```\n",
        1,
    );
    let runner = ScriptedRunner::new(vec![Ok(passing())]);

    let report = pipeline(&enrich, &ScriptedOracle::default(), &runner)
        .run_unit(&source, "Add", UnitOptions::default())
        .await;
    assert_eq!(report.status, UnitStatus::Success);
    assert_eq!(report.attempts, 1);

    let written = fs::read_to_string(source.with_file_name("calc_test.go")).unwrap();
    assert_eq!(written.matches("func TestAdd(").count(), 1);
    assert_eq!(written.matches("func TestMain(").count(), 1);
    assert!(written.contains("t.Fatal(\"bad sum\")"));
    assert!(!written.contains("success_case"));
    assert!(!written.contains("Here is the completed test"));
}

#[tokio::test]
async fn debug_oracle_failure_stops_immediately() {
    let (_tmp, source) = calc_project();
    let debug = ScriptedOracle::new(vec![Err(OracleError::Unavailable("rate limited".to_string()))]);
    let runner = ScriptedRunner::default();

    let report = pipeline(&ScriptedOracle::default(), &debug, &runner)
        .run_unit(&source, "Add", no_enrich())
        .await;

    assert_eq!(report.status, UnitStatus::SuccessWithWarning);
    assert_eq!(report.attempts, 1);
    assert_eq!(runner.calls().len(), 1);
    assert!(report.error.as_deref().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn debug_response_without_the_test_stops_and_keeps_it() {
    let (_tmp, source) = calc_project();
    let renamed = "```go\nfunc TestAddition(t *testing.T) {\n\tt.Log(\"renamed\")\n}\n```";
    let debug = ScriptedOracle::always(renamed, 3);
    let runner = ScriptedRunner::new(vec![Ok(failing()), Ok(passing())]);

    let report = pipeline(&ScriptedOracle::default(), &debug, &runner)
        .run_unit(&source, "Add", no_enrich())
        .await;

    assert_eq!(report.status, UnitStatus::SuccessWithWarning);
    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.attempts, 1);
    assert_eq!(runner.calls().len(), 1);
    assert!(report.error.as_deref().unwrap().contains("does not define TestAdd"));

    let written = fs::read_to_string(source.with_file_name("calc_test.go")).unwrap();
    assert_eq!(written.matches("func TestAdd(").count(), 1);
    assert!(!written.contains("TestAddition"));
}

#[tokio::test]
async fn runner_timeout_counts_as_failed_attempt() {
    let (_tmp, source) = calc_project();
    let debug = ScriptedOracle::always(FIXED_TEST, 1);
    let runner = ScriptedRunner::new(vec![Err(RunnerError::Timeout(30)), Ok(passing())]);

    let report = pipeline(&ScriptedOracle::default(), &debug, &runner)
        .run_unit(&source, "Add", no_enrich())
        .await;

    assert_eq!(report.status, UnitStatus::Success);
    assert_eq!(report.attempts, 2);
    assert!(debug.prompts()[0].contains("timed out after 30s"));
}

#[tokio::test]
async fn missing_file_or_function_has_no_side_effects() {
    let (tmp, source) = calc_project();
    let runner = ScriptedRunner::default();
    let pipeline = pipeline(&ScriptedOracle::default(), &ScriptedOracle::default(), &runner);

    let report = pipeline
        .run_unit(&tmp.path().join("calc").join("absent.go"), "Add", no_enrich())
        .await;
    assert_eq!(report.status, UnitStatus::Failed);
    assert_eq!(report.state, PipelineState::ScanFail);
    assert!(report.error.as_deref().unwrap().starts_with("not found"));

    let report = pipeline.run_unit(&source, "Mul", no_enrich()).await;
    assert_eq!(report.status, UnitStatus::Failed);
    assert_eq!(report.attempts, 0);
    assert!(report.test_file_path.is_none());

    assert!(runner.calls().is_empty());
    assert!(!source.with_file_name("calc_test.go").exists());
}

#[tokio::test]
async fn unwritable_test_file_is_partially_failed() {
    let (_tmp, source) = calc_project();
    fs::create_dir(source.with_file_name("calc_test.go")).unwrap();
    let runner = ScriptedRunner::default();

    let report = pipeline(&ScriptedOracle::default(), &ScriptedOracle::default(), &runner)
        .run_unit(&source, "Add", no_enrich())
        .await;

    assert_eq!(report.status, UnitStatus::PartiallyFailed);
    assert!(report.scaffold.as_deref().unwrap().contains("func TestAdd("));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn whole_file_shares_one_test_file_and_one_bootstrap() {
    let (_tmp, source) = calc_project();
    let runner = ScriptedRunner::new(vec![Ok(passing()), Ok(passing())]);

    let reports = pipeline(&ScriptedOracle::default(), &ScriptedOracle::default(), &runner)
        .run_file(&source, no_enrich())
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.status == UnitStatus::Success));
    let selectors: Vec<String> = runner.calls().into_iter().map(|(_, s)| s).collect();
    assert_eq!(selectors, vec!["^TestAdd$", "^TestSub$"]);

    let written = fs::read_to_string(source.with_file_name("calc_test.go")).unwrap();
    assert_eq!(written.matches("func TestMain(").count(), 1);
    assert_eq!(written.matches("func TestAdd(").count(), 1);
    assert_eq!(written.matches("func TestSub(").count(), 1);
    assert_eq!(written.matches("package calc").count(), 1);
    assert_eq!(written.matches("import (").count(), 1);
}

#[tokio::test]
async fn directory_run_skips_tests_and_bootstraps_each_directory_once() {
    let (tmp, _source) = calc_project();
    let strings = tmp.path().join("strs");
    fs::create_dir(&strings).unwrap();
    fs::write(
        strings.join("upper.go"),
        "package strs\n\nfunc Upper(s string) string {\n\treturn s\n}\n",
    )
    .unwrap();
    fs::write(
        strings.join("main_test.go"),
        "package strs\n\nimport \"testing\"\n\nfunc TestMain(m *testing.M) { m.Run() }\n",
    )
    .unwrap();

    let runner = ScriptedRunner::new(vec![Ok(passing()); 3]);
    let reports = pipeline(&ScriptedOracle::default(), &ScriptedOracle::default(), &runner)
        .run_directory(tmp.path(), no_enrich())
        .await;

    let names: Vec<&str> = reports.iter().map(|r| r.function_name.as_str()).collect();
    assert_eq!(names, vec!["Add", "Sub", "Upper"]);

    let upper_test = fs::read_to_string(strings.join("upper_test.go")).unwrap();
    assert!(upper_test.starts_with("package strs\n"));
    assert!(upper_test.contains("func TestUpper("));
    assert!(!upper_test.contains("func TestMain("));
}
