mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::TestFields;
use cpptest_common::config::AppConfig;
use cpptest_common::store::TestStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpptest-cli")]
#[command(about = "cpptest CLI - Create, inspect and delete stored tests", long_about = None)]
struct Cli {
    /// Config file (defaults to $CPPTEST_CONFIG or config/cpptest.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new test
    Create {
        /// Test name, also the file name in the tests directory
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        fields: FieldArgs,

        /// Overwrite an existing test without asking
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },

    /// Change fields of an existing test
    Edit {
        /// Test name or path to a test JSON file
        test: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Show a test's description
    Info {
        /// Test name or path to a test JSON file
        test: String,
    },

    /// List all tests in the tests directory
    List,

    /// Print a test as JSON
    Show {
        /// Test name or path to a test JSON file
        test: String,
    },

    /// Delete a test
    Delete {
        /// Test name or path to a test JSON file
        test: String,

        /// Skip confirmation
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },
}

#[derive(Args)]
struct FieldArgs {
    /// Free-form description
    #[arg(short, long)]
    description: Option<String>,

    /// Comma-separated forbidden constructs (e.g. "goto, while")
    #[arg(short, long)]
    forbidden: Option<String>,

    /// Standard input fed to the program
    #[arg(short, long, conflicts_with = "input_file")]
    input: Option<String>,

    /// File holding the standard input
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Expected program output
    #[arg(short, long, conflicts_with = "expected_file")]
    expected: Option<String>,

    /// File holding the expected output
    #[arg(long)]
    expected_file: Option<PathBuf>,
}

impl FieldArgs {
    async fn into_fields(self) -> Result<TestFields> {
        Ok(TestFields {
            description: self.description,
            forbidden: self.forbidden,
            input: text_or_file(self.input, self.input_file).await?,
            expected: text_or_file(self.expected, self.expected_file).await?,
        })
    }
}

async fn text_or_file(text: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (text, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let store = TestStore::new(config.tests_dir());

    match cli.command {
        Commands::Create { name, fields, yes } => {
            let fields = fields.into_fields().await?;
            commands::create_test(&store, &name, fields, yes)?;
        }
        Commands::Edit { test, fields } => {
            let fields = fields.into_fields().await?;
            commands::edit_test(&store, &test, fields)?;
        }
        Commands::Info { test } => {
            commands::show_info(&store, &test)?;
        }
        Commands::List => {
            commands::list_tests(&store)?;
        }
        Commands::Show { test } => {
            commands::show_test(&store, &test)?;
        }
        Commands::Delete { test, yes } => {
            commands::delete_test(&store, &test, yes)?;
        }
    }

    Ok(())
}
