//! Science file metadata tracker.
//!
//! Creates the mission catalog, records science files into it and keeps
//! their processing status history.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use metatracker::commands::{self, TrackJob};
use metatracker::config_loader::resolve_mission_config;
use tracker::{parse_origin_ids, FileConflictPolicy, RetryPolicy, StatusUpdate, TrackRequest, TrackerOptions};

#[derive(Parser, Debug)]
#[command(name = "metatracker")]
#[command(about = "Track science files and their processing status in a mission catalog")]
struct Cli {
    /// Mission configuration file (defaults to the built-in HERMES catalog)
    #[arg(short, long, env = "METATRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Database connection string, overrides the configuration file
    #[arg(long, env = "METATRACKER_DB_HOST")]
    db_host: Option<String>,

    /// Log level (ignored when RUST_LOG is set)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Attempts for each catalog write before giving up
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the catalog tables and seed the reference data
    Setup,
    /// Drop every catalog table of the mission
    Teardown,
    /// Record one or more science files
    Track(TrackArgs),
    /// Record a processing run for a tracked file
    Status(StatusArgs),
    /// Print the catalog record of a file
    Show {
        /// Filename without extension
        filename: String,
    },
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Files or directories to track
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Object storage key of the file
    #[arg(long)]
    storage_key: Option<String>,

    /// Object storage bucket or location
    #[arg(long)]
    storage_location: Option<String>,

    /// Attach the files to this existing science product
    #[arg(long)]
    product_id: Option<i64>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Replace the stored attributes of already tracked files
    #[arg(long)]
    overwrite: bool,

    /// Files tracked at the same time
    #[arg(long, default_value = "4")]
    concurrency: usize,

    #[command(flatten)]
    status_fields: StatusFields,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Science file id
    file_id: i64,

    #[command(flatten)]
    status_fields: StatusFields,
}

#[derive(Args, Debug)]
struct StatusFields {
    /// Processing status to record
    #[arg(long)]
    status: Option<String>,

    /// Free-form status message
    #[arg(long = "status-message")]
    message: Option<String>,

    /// Processing time in seconds
    #[arg(long)]
    processing_time: Option<i64>,

    /// Ids of the files this one was produced from (repeatable, comma separated)
    #[arg(long = "origin-id")]
    origin_ids: Vec<String>,
}

impl StatusFields {
    fn into_update(self) -> Result<Option<StatusUpdate>> {
        let Some(processing_status) = self.status else {
            if self.message.is_some() || self.processing_time.is_some() || !self.origin_ids.is_empty() {
                anyhow::bail!("--status-message, --processing-time and --origin-id require --status");
            }
            return Ok(None);
        };

        let origins = parse_origin_ids(&self.origin_ids)?;
        Ok(Some(StatusUpdate {
            processing_status,
            processing_status_message: self.message,
            processing_time_length: self.processing_time,
            origin_file_ids: (!origins.is_empty()).then_some(origins),
        }))
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let config = resolve_mission_config(cli.config.as_deref(), cli.db_host.as_deref())?;
    let retry = RetryPolicy {
        max_attempts: cli.max_attempts.max(1),
        ..RetryPolicy::default()
    };

    match cli.command {
        Command::Setup => {
            print_json(&commands::setup(&config).await?)?;
        }
        Command::Teardown => {
            print_json(&commands::teardown(&config).await?)?;
        }
        Command::Track(args) => {
            let job = TrackJob {
                paths: args.paths,
                recursive: args.recursive,
                concurrency: args.concurrency,
                request: TrackRequest {
                    storage_key: args.storage_key,
                    storage_location: args.storage_location,
                    science_product_id: args.product_id,
                    status: args.status_fields.into_update()?,
                },
                options: TrackerOptions {
                    retry,
                    file_conflict: if args.overwrite {
                        FileConflictPolicy::Overwrite
                    } else {
                        FileConflictPolicy::KeepExisting
                    },
                },
            };
            let summary = commands::track(&config, &job).await?;
            info!(tracked = summary.tracked, failed = summary.failed, "Tracking finished");
            print_json(&summary)?;
            if summary.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Status(args) => {
            let update = args
                .status_fields
                .into_update()?
                .context("--status is required")?;
            let options = TrackerOptions {
                retry,
                ..Default::default()
            };
            print_json(&commands::update_status(&config, args.file_id, &update, options).await?)?;
        }
        Command::Show { filename } => match commands::show(&config, &filename).await? {
            Some(report) => print_json(&report)?,
            None => {
                eprintln!("No science file named '{}'", filename);
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
