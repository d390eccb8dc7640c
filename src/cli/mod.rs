mod commands;
pub mod error;
pub mod utils;

#[cfg(test)]
mod utils_test;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::batch::GenerationRequest;
use crate::config::{Settings, SettingsArgs};
use crate::logging::init_tracing;

use commands::coverage::CountSource;
use error::{CliError, CliResult};
use utils::parse_list;

#[derive(Parser)]
#[command(name = "qbank")]
#[command(author, version, about = "Certification question batch toolkit", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate questions as a batch job and save them
    Generate {
        /// Certification code (e.g. aws-saa-c03)
        certification: String,
        /// Number of questions
        #[arg(short = 'n', long)]
        count: usize,
        /// Exam domains (comma-separated)
        #[arg(long)]
        domains: Option<String>,
        /// Difficulty tier
        #[arg(long)]
        complexity: Option<String>,
        /// Target experience level
        #[arg(long)]
        experience: Option<String>,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Output format (json or sql)
        #[arg(long, default_value = "json")]
        format: String,
        /// Print the job id instead of waiting for results
        #[arg(long)]
        no_wait: bool,
    },
    /// Check a batch job's status once
    Status {
        /// Batch job ID
        job_id: String,
    },
    /// Wait for an existing batch job and save its questions
    Resume {
        /// Batch job ID
        job_id: String,
        /// Output format (json or sql)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Compare per-domain question counts against a coverage profile
    Coverage {
        /// Profile name (see `qbank profiles`)
        profile: String,
        /// Total number of questions the bank should hold
        #[arg(long)]
        total: u64,
        /// Saved batch files to count (repeatable)
        #[arg(long = "file", conflicts_with = "counts")]
        files: Vec<PathBuf>,
        /// Observed count as DOMAIN=N (repeatable)
        #[arg(long = "count", value_name = "DOMAIN=N")]
        counts: Vec<String>,
        /// Certification to fetch counts for (default: the profile name)
        #[arg(long)]
        certification: Option<String>,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List coverage profiles
    Profiles {
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show the questions in a saved batch file
    Inspect {
        /// Path to a .json or .sql batch file
        path: PathBuf,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

pub async fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing("qbank=warn");

    let Some(command) = cli.command else {
        // Show help when no command provided
        let _ = Cli::parse_from(["qbank", "--help"]);
        return Ok(());
    };

    let settings = Settings::resolve(&cli.settings)?;
    let output = execute(command, &settings).await?;
    println!("{}", output);
    Ok(())
}

async fn execute(command: Commands, settings: &Settings) -> CliResult<String> {
    match command {
        Commands::Generate {
            certification,
            count,
            domains,
            complexity,
            experience,
            tags,
            format,
            no_wait,
        } => {
            let format = commands::batch::parse_output_format(&format)?;
            let request = GenerationRequest {
                certification,
                domains: parse_list(domains.as_deref()),
                count,
                complexity,
                experience,
                tags: parse_list(tags.as_deref()),
            };
            let orchestrator = settings.build_orchestrator(Arc::new(settings.build_backend()?));
            commands::batch::generate(
                &orchestrator,
                &settings.output_sink(),
                settings.poll,
                &request,
                format,
                !no_wait,
            )
            .await
        }
        Commands::Status { job_id } => {
            let orchestrator = settings.build_orchestrator(Arc::new(settings.build_backend()?));
            commands::batch::status(&orchestrator, &job_id).await
        }
        Commands::Resume { job_id, format } => {
            let format = commands::batch::parse_output_format(&format)?;
            let orchestrator = settings.build_orchestrator(Arc::new(settings.build_backend()?));
            commands::batch::resume(
                &orchestrator,
                &settings.output_sink(),
                settings.poll,
                &job_id,
                format,
            )
            .await
        }
        Commands::Coverage {
            profile,
            total,
            files,
            counts,
            certification,
            format,
        } => {
            let registry = settings.load_profiles()?;
            let source = if !files.is_empty() {
                CountSource::Files(files)
            } else if !counts.is_empty() {
                CountSource::Pairs(counts)
            } else {
                CountSource::Backend {
                    certification: certification.unwrap_or_else(|| profile.clone()),
                }
            };
            let observed = commands::coverage::observed_counts(
                &source,
                || settings.build_backend().map_err(CliError::from),
                &settings.routes,
            )
            .await?;
            commands::coverage::coverage(&registry, &profile, total, &observed, &format)
        }
        Commands::Profiles { format } => {
            let registry = settings.load_profiles()?;
            commands::coverage::list_profiles(&registry, &format)
        }
        Commands::Inspect { path, format } => commands::batch::inspect(&path, &format),
    }
}
