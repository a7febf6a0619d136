use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod progress;

use progress::ProgressIndicator;
use testsmith::config::Settings;
use testsmith::contexts::scanner;
use testsmith::contexts::{CaseType, Pipeline, PipelineConfig, UnitOptions};
use testsmith::data::UnitReport;
use testsmith::error::OracleError;
use testsmith::oracles::OracleBackend;
use testsmith::registries::{FileOracleRegistry, OracleRole};
use testsmith::runners::GoTestRunner;

#[derive(Clone)]
pub struct Config {
    pub verbose: bool,
    pub registry: Option<PathBuf>,
}

/// Per-run tuning shared by `generate` and `project`.
#[derive(Clone, Copy)]
pub struct RunOptions {
    pub use_llm: bool,
    pub case_type: CaseType,
    pub max_attempts: usize,
    pub timeout_secs: u64,
}

/// Which functions of a file `generate` works on.
pub enum Target {
    Function(String),
    All,
}

pub async fn generate(file: PathBuf, target: Target, options: RunOptions, config: &Config) -> Result<Vec<UnitReport>> {
    let pipeline = build_pipeline(&options, config)?;
    let unit_options = unit_options(&options);

    let reports = match target {
        Target::Function(name) => {
            println!("Generating test for {} in {}", name, file.display());
            vec![pipeline.run_unit(&file, &name, unit_options).await]
        }
        Target::All => {
            println!("Generating tests for every function in {}", file.display());
            pipeline.run_file(&file, unit_options).await
        }
    };

    summarize(&reports);
    Ok(reports)
}

pub async fn project(dir: PathBuf, options: RunOptions, config: &Config) -> Result<Vec<UnitReport>> {
    if !dir.is_dir() {
        anyhow::bail!("Project directory not found: {}", dir.display());
    }
    let pipeline = build_pipeline(&options, config)?;

    let files = scanner::find_source_files(&dir);
    if files.is_empty() {
        println!("No Go source files found under {}", dir.display());
        return Ok(Vec::new());
    }
    println!("Generating tests for {} source file(s) under {}", files.len(), dir.display());

    let reports = pipeline.run_directory(&dir, unit_options(&options)).await;
    summarize(&reports);
    Ok(reports)
}

/// Prints the records of one file as JSON.
pub fn scan(file: &Path, config: &Config) -> Result<()> {
    let records = scanner::scan_file(file).with_context(|| format!("Failed to scan {}", file.display()))?;
    if config.verbose {
        eprintln!("{} function(s) found in {}", records.len(), file.display());
    }
    let json = serde_json::to_string_pretty(&records).context("Failed to serialize function records")?;
    println!("{}", json);
    Ok(())
}

fn unit_options(options: &RunOptions) -> UnitOptions {
    UnitOptions {
        enrich: options.use_llm,
        case_type: options.case_type,
    }
}

fn build_pipeline(options: &RunOptions, config: &Config) -> Result<Pipeline<OracleBackend, GoTestRunner>> {
    let settings = Settings::from_env();
    let registry = FileOracleRegistry::new(config.registry.clone(), settings.default_backend());

    let (enrich, debug) = if options.use_llm {
        (
            build_oracle(&registry, OracleRole::Enrich, &settings)?,
            build_oracle(&registry, OracleRole::Debug, &settings)?,
        )
    } else {
        let disabled = || OracleBackend::Unavailable(OracleError::Unavailable("disabled by --no-llm".to_string()));
        (disabled(), disabled())
    };

    if config.verbose {
        println!("Enrich oracle: {}", enrich.describe());
        println!("Debug oracle:  {}", debug.describe());
    }

    let pipeline_config = PipelineConfig {
        max_attempts: options.max_attempts.max(1),
        runner_timeout: Duration::from_secs(options.timeout_secs.max(1)),
        ..PipelineConfig::default()
    };
    Ok(Pipeline::new(
        pipeline_config,
        settings.scaffold_template(),
        enrich,
        debug,
        GoTestRunner::default(),
    ))
}

/// An unusable backend only disables its role; the scaffold is still
/// written and validated.
fn build_oracle(registry: &FileOracleRegistry, role: OracleRole, settings: &Settings) -> Result<OracleBackend> {
    let role_config = registry
        .get_role(role)
        .with_context(|| format!("Failed to resolve the {} oracle", role))?;

    match OracleBackend::build(role_config.backend, role_config.model.as_deref(), settings) {
        Ok(backend) => Ok(backend),
        Err(e) => {
            eprintln!("warning: {} oracle disabled: {}", role, e);
            Ok(OracleBackend::Unavailable(e))
        }
    }
}

fn summarize(reports: &[UnitReport]) {
    let mut progress = ProgressIndicator::new();
    for report in reports {
        progress.record(report);
    }
    progress.finish();
}
