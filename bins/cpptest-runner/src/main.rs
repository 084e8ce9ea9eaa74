mod engine;
mod evaluator;
mod executor;
mod forbidden;
mod presenter;

#[cfg(test)]
mod engine_tests;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpptest_common::config::AppConfig;
use cpptest_common::store::TestStore;
use cpptest_common::types::TestRecord;
use engine::{CompilerCommand, ProcessToolchain};
use executor::{RunFailure, SourcePlacement, Stage, TestOrchestrator};
use presenter::{ConsolePresenter, OutputPresenter};
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cpptest-runner")]
#[command(about = "Compile and run C++ sources, optionally against a stored test", long_about = None)]
struct Cli {
    /// Config file (defaults to $CPPTEST_CONFIG or config/cpptest.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    /// Emit logs (stderr) as JSON lines
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a source file
    Run {
        /// C++ source file
        source: PathBuf,

        /// Text fed to the program's standard input
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// File whose contents are fed to standard input
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Keep the source (and executable) at this path instead of a scratch directory
        #[arg(long)]
        save_as: Option<PathBuf>,
    },

    /// Compile and run a source file against a stored test
    Test {
        /// C++ source file
        source: PathBuf,

        /// Test name or path to a test JSON file
        #[arg(short, long)]
        test: String,

        /// Keep the source (and executable) at this path instead of a scratch directory
        #[arg(long)]
        save_as: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .with_line_number(true);

    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = AppConfig::load_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    info!(
        compiler = %config.compiler,
        tests_dir = %config.tests_dir().display(),
        "cpptest runner starting"
    );

    let mut compiler = CompilerCommand::new(config.compiler.clone());
    compiler.args = config.compiler_args.clone();

    let toolchain = ProcessToolchain::new(compiler, config.compile_timeout(), config.run_timeout());
    let orchestrator = TestOrchestrator::new(
        toolchain,
        config.forbidden_case,
        config.executable_suffix(),
    );
    let presenter = ConsolePresenter::new(cli.json);

    match cli.command {
        Commands::Run {
            source,
            input,
            input_file,
            save_as,
        } => {
            let code = read_source(&source).await?;
            let stdin = match (input, input_file) {
                (Some(text), _) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read input file {}", path.display()))?,
                (None, None) if forbidden::reads_stdin(&code) => prompt_for_input()?,
                (None, None) => String::new(),
            };

            match orchestrator
                .compile_and_run(&code, &stdin, &placement(save_as))
                .await
            {
                Ok(output) => {
                    presenter.present_output("Execution result", &output);
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    presenter.present_failure(&failure);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Test {
            source,
            test,
            save_as,
        } => {
            let code = read_source(&source).await?;

            let store = TestStore::new(config.tests_dir());
            let record = match load_record(&store, &test) {
                Ok(record) => record,
                Err(failure) => {
                    presenter.present_failure(&failure);
                    return Ok(ExitCode::FAILURE);
                }
            };

            let report = orchestrator
                .run_with_test(&code, &record, &placement(save_as))
                .await;
            presenter.present_report(&report);

            Ok(if report.verdict.is_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Load the test named on the command line; failures are reported like any
/// other pre-build abort.
fn load_record(store: &TestStore, test: &str) -> Result<TestRecord, RunFailure> {
    let path = store.resolve(test);
    store.load(&path).map_err(|e| {
        error!(test = %path.display(), error = %e, "Failed to load test");
        RunFailure {
            stage: Stage::Idle,
            reason: format!("Failed to load test: {}", e),
        }
    })
}

fn placement(save_as: Option<PathBuf>) -> SourcePlacement {
    save_as
        .map(SourcePlacement::SaveAs)
        .unwrap_or(SourcePlacement::Scratch)
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read source file {}", path.display()))
}

/// One line from the terminal, or everything piped in
fn prompt_for_input() -> Result<String> {
    let stdin = io::stdin();

    if !stdin.is_terminal() {
        let mut input = String::new();
        stdin
            .lock()
            .read_to_string(&mut input)
            .context("Failed to read standard input")?;
        return Ok(input);
    }

    print!("Enter input: ");
    io::stdout().flush()?;

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("Failed to read standard input")?;
    Ok(line)
}
