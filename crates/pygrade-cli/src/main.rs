//! Pygrade CLI
//!
//! A command-line tool for grading Python exercise submissions against
//! authored test files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pygrade::{Config, EXAMPLE_CONFIG, Harness, PythonResult};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pygrade")]
#[command(about = "A tool for grading Python exercise submissions")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: pygrade.toml)
        #[arg(short, long, default_value = "pygrade.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Grade a submission against a test file
    Run {
        /// Submission source file
        #[arg(value_name = "FILE")]
        submission: PathBuf,

        /// Test source file
        #[arg(short, long)]
        tests: PathBuf,

        /// Phase timeout in seconds (overrides the config value)
        #[arg(long)]
        timeout: Option<f64>,

        /// Print the result as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::default().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from '{}'", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Run {
            submission,
            tests,
            timeout,
            json,
        } => run_grade(config, &submission, &tests, timeout, json).await,
        Commands::Config => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_grade(
    mut config: Config,
    submission: &PathBuf,
    tests: &PathBuf,
    timeout: Option<f64>,
    json: bool,
) -> Result<()> {
    if let Some(seconds) = timeout {
        config.phase_timeout = seconds;
    }

    let user_code = tokio::fs::read_to_string(submission)
        .await
        .with_context(|| format!("failed to read submission '{}'", submission.display()))?;
    let test_code = tokio::fs::read_to_string(tests)
        .await
        .with_context(|| format!("failed to read tests '{}'", tests.display()))?;

    info!(
        submission = %submission.display(),
        tests = %tests.display(),
        "grading submission"
    );

    let harness = Harness::new(&config);
    let result = harness.run(&user_code, &test_code).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    // Exit code mirrors the verdict so the tool composes in scripts.
    if result.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn print_result(result: &PythonResult) {
    if !result.output.is_empty() {
        println!("{}", result.output);
        println!();
    }
    if result.success {
        println!("PASS: all tests passed");
    } else {
        println!("FAIL: tests did not pass");
    }
    if let Some(error) = &result.error {
        println!("Error: {error}");
    }
}

fn show_config(config: &Config) {
    println!("Artifact URL: {}", config.artifact_url);
    match &config.cache_dir {
        Some(dir) => println!("Cache directory: {}", dir.display()),
        None => println!("Cache directory: (platform default)"),
    }
    println!("Phase timeout: {:.1}s", config.phase_timeout);
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
