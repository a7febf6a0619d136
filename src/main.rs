use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use testsmith::contexts::CaseType;
use testsmith::contexts::pipeline::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RUNNER_TIMEOUT};

mod cli;

#[derive(Parser)]
#[command(name = "testsmith")]
#[command(about = "Generates, runs and repairs Go unit tests with a code-generation model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Oracle registry file (defaults to testsmith.yml)")]
    registry: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate tests for one function or every function of a file")]
    Generate {
        #[arg(long, help = "Go source file containing the function(s)")]
        file: PathBuf,

        #[arg(long, conflicts_with = "all", required_unless_present = "all", help = "Function to generate a test for")]
        function: Option<String>,

        #[arg(long, help = "Generate tests for every function in the file")]
        all: bool,

        #[command(flatten)]
        tuning: Tuning,
    },

    #[command(about = "Generate tests for every Go source file under a directory")]
    Project {
        #[arg(help = "Project directory")]
        dir: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },

    #[command(about = "Print the functions found in a Go source file as JSON")]
    Scan {
        #[arg(help = "Go source file")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct Tuning {
    #[arg(long, help = "Do not call any code-generation model")]
    no_llm: bool,

    #[arg(long, default_value = "both", help = "Scaffold case to fill in: fail, success or both")]
    case_type: CaseType,

    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, help = "Maximum test runs per function")]
    max_attempts: usize,

    #[arg(long, default_value_t = DEFAULT_RUNNER_TIMEOUT.as_secs(), help = "Timeout of one test run in seconds")]
    timeout: u64,
}

impl Tuning {
    fn run_options(&self) -> cli::RunOptions {
        cli::RunOptions {
            use_llm: !self.no_llm,
            case_type: self.case_type,
            max_attempts: self.max_attempts,
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        registry: cli.registry,
    };

    let reports = match cli.command {
        Commands::Generate {
            file,
            function,
            all: _,
            tuning,
        } => {
            let target = match function {
                Some(name) => cli::Target::Function(name),
                None => cli::Target::All,
            };
            cli::generate(file, target, tuning.run_options(), &config).await?
        }
        Commands::Project { dir, tuning } => cli::project(dir, tuning.run_options(), &config).await?,
        Commands::Scan { file } => {
            cli::scan(&file, &config)?;
            return Ok(());
        }
    };

    if !reports.iter().any(|report| report.succeeded()) {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
