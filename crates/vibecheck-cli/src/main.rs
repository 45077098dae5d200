//! vibecheck - visual assertions from the command line
//!
//! ## Commands
//!
//! - `check`: judge an existing image against a natural-language specification
//! - `judges`: list configured judges and whether they have credentials
//!
//! ## Exit codes
//!
//! - 0: the check passed
//! - 1: the check ran and the image did not meet the specification
//! - 2: configuration, credential, network or filesystem failure

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use vibecheck_core::{EvaluationOverrides, Verdict};
use vibecheck_runtime::{
    CheckError, CheckOptions, CheckOrchestrator, FileCapture, JudgeFactoryRegistry, JudgeRegistry,
    SessionConfig,
};

const EXIT_PASS: i32 = 0;
const EXIT_CHECK_FAILED: i32 = 1;
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "vibecheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Judge screenshots against natural-language specifications", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session config file (YAML, or JSON by extension)
    #[arg(short, long, global = true, env = "VIBECHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge an image against a specification
    Check {
        /// Image to judge
        image: PathBuf,

        /// Expected visual state, in plain language
        specification: String,

        /// Judge to use (default: the session default)
        #[arg(short, long)]
        judge: Option<String>,

        /// Minimum confidence to pass, 0.0 - 1.0
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Total judge attempts
        #[arg(long)]
        max_retries: Option<u32>,

        /// Extra artifact name component
        #[arg(short, long)]
        name: Option<String>,

        /// Title used to name the artifact (default: image file stem)
        #[arg(long)]
        title: Option<String>,

        /// Artifact directory (overrides the config file)
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Include the judge's raw reply in the verdict
        #[arg(long)]
        raw: bool,

        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List configured judges
    Judges,
}

/// JSON shape printed by `check --json`.
#[derive(Serialize)]
struct CheckReport<'a> {
    pass: bool,
    judge: Option<&'a str>,
    artifact: &'a Path,
    verdict: &'a Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let session = load_session(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            image,
            specification,
            judge,
            threshold,
            max_retries,
            name,
            title,
            artifacts_dir,
            raw,
            json,
        } => {
            let mut session = session;
            if let Some(dir) = artifacts_dir {
                session.artifacts_dir = dir;
            }

            let mut overrides = EvaluationOverrides::new();
            overrides.judge_name = judge;
            overrides.confidence_threshold = threshold;
            overrides.max_retries = max_retries;
            if raw {
                overrides.include_raw_reply = Some(true);
            }

            let title = title.unwrap_or_else(|| {
                image
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "vibecheck".to_string())
            });

            let mut options = CheckOptions::new().evaluation(overrides);
            options.name = name;

            cmd_check(session, &image, &specification, &title, options, json).await
        }
        Commands::Judges => cmd_judges(&session).await,
    }
}

fn load_session(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

async fn cmd_check(
    session: SessionConfig,
    image: &Path,
    specification: &str,
    title: &str,
    options: CheckOptions,
    json: bool,
) -> Result<i32> {
    tracing::debug!(image = %image.display(), title, "Running visual check");

    let factories = JudgeFactoryRegistry::with_defaults();
    let orchestrator = CheckOrchestrator::from_config(session, &factories, FileCapture)
        .context("Failed to set up judges")?;

    match orchestrator.scope(title).check(image, specification, options).await {
        Ok(outcome) => {
            if json {
                print_report(&CheckReport {
                    pass: true,
                    judge: Some(&outcome.judge),
                    artifact: &outcome.artifact_path,
                    verdict: &outcome.verdict,
                    message: None,
                })?;
            } else {
                println!(
                    "PASS ({:.1}% confidence, judge: {})",
                    outcome.verdict.confidence() * 100.0,
                    outcome.judge
                );
                if let Some(reasoning) = outcome.verdict.reasoning() {
                    println!("{}", reasoning);
                }
                println!("Artifact: {}", outcome.artifact_path.display());
            }
            Ok(EXIT_PASS)
        }
        Err(CheckError::Failed(failure)) => {
            if json {
                print_report(&CheckReport {
                    pass: false,
                    judge: None,
                    artifact: &failure.artifact_path,
                    verdict: &failure.verdict,
                    message: Some(&failure.message),
                })?;
            }
            eprintln!("{}", failure.message);
            Ok(EXIT_CHECK_FAILED)
        }
        Err(e) => Err(e).context("Visual check could not run"),
    }
}

fn print_report(report: &CheckReport<'_>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn cmd_judges(session: &SessionConfig) -> Result<i32> {
    let factories = JudgeFactoryRegistry::with_defaults();
    let registry =
        JudgeRegistry::from_config(session, &factories).context("Failed to set up judges")?;

    if registry.is_empty() {
        println!("No judges configured.");
        return Ok(EXIT_PASS);
    }

    for registration in registry.registrations() {
        let provider = session
            .judges
            .get(&registration.name)
            .map(|j| j.provider.as_str())
            .unwrap_or("?");
        let marker = if registry.is_default(&registration.name) {
            "*"
        } else {
            " "
        };
        let credential = if registration.evaluator.health_check().await {
            "ready"
        } else {
            "missing credential"
        };

        println!(
            "{} {:<16} {:<12} {}",
            marker, registration.name, provider, credential
        );
    }

    Ok(EXIT_PASS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "vibecheck",
            "check",
            "shot.png",
            "A blue button",
            "--judge",
            "openai",
            "--threshold",
            "0.6",
            "--raw",
        ])
        .unwrap();

        match cli.command {
            Commands::Check {
                image,
                specification,
                judge,
                threshold,
                raw,
                json,
                ..
            } => {
                assert_eq!(image, PathBuf::from("shot.png"));
                assert_eq!(specification, "A blue button");
                assert_eq!(judge.as_deref(), Some("openai"));
                assert_eq!(threshold, Some(0.6));
                assert!(raw);
                assert!(!json);
            }
            Commands::Judges => panic!("expected check"),
        }
    }

    #[test]
    fn test_parse_judges_with_global_config() {
        let cli = Cli::try_parse_from(["vibecheck", "judges", "--config", "vibes.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Judges));
        assert_eq!(cli.config, Some(PathBuf::from("vibes.yaml")));
    }

    #[test]
    fn test_missing_config_is_error() {
        let dir = std::env::temp_dir().join("vibecheck-cli-missing-config.yaml");
        assert!(load_session(Some(&dir)).is_err());
        assert_eq!(load_session(None).unwrap(), SessionConfig::default());
    }
}
