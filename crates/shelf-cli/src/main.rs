use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shelf_migrate::{
    FileMigrationService, MigrationConfig, MigrationProgress, MigrationReport, ProgressReporter,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shelf-migrate")]
#[command(about = "Move a legacy library into the relational store, once", long_about = None)]
struct Cli {
    /// Directory holding legacy.json, library.sqlite3 and the completion flag.
    /// Falls back to SHELF_DATA_DIR, then the working directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    legacy: Option<PathBuf>,
    #[arg(long, global = true)]
    target: Option<PathBuf>,
    #[arg(long, global = true)]
    flag: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether a migration is still pending
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Migrate if required, then mark the install as completed
    Run {
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(long)]
        progress_stride: Option<usize>,
    },
    /// Clear the completion flag
    Reset,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    completed: bool,
    requires_migration: bool,
    pending_books: usize,
    legacy_path: PathBuf,
    target_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    ran: bool,
    report: Option<MigrationReport>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let data_dir = MigrationConfig::resolve_data_dir(cli.data_dir.clone())?;
    let mut config = MigrationConfig::from_data_dir(&data_dir);
    if let Some(path) = cli.legacy {
        config.legacy_path = path;
    }
    if let Some(path) = cli.target {
        config.target_path = path;
    }
    if let Some(path) = cli.flag {
        config.flag_path = path;
    }

    match cli.command {
        Commands::Status { json } => status(&config, json),
        Commands::Run {
            json,
            progress_stride,
        } => {
            if let Some(stride) = progress_stride {
                config = config.with_progress_stride(stride)?;
            }
            run(&config, json)
        }
        Commands::Reset => {
            let service = open_service(&config)?;
            service
                .tracker()
                .reset()
                .context("Failed to reset completion flag")?;
            println!("Completion flag cleared at {}", config.flag_path.display());
            Ok(())
        }
    }
}

fn open_service(config: &MigrationConfig) -> Result<FileMigrationService> {
    FileMigrationService::open(config).with_context(|| {
        format!(
            "Failed to open library store at {}",
            config.target_path.display()
        )
    })
}

fn status(config: &MigrationConfig, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let requires_migration = service
        .requires_migration()
        .context("Failed to read completion flag")?;
    let pending_books = if requires_migration {
        service
            .book_count()
            .context("Failed to read legacy store")?
    } else {
        0
    };
    let output = StatusOutput {
        completed: service.tracker().is_completed()?,
        requires_migration,
        pending_books,
        legacy_path: config.legacy_path.clone(),
        target_path: config.target_path.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if output.requires_migration {
        println!(
            "Migration pending: {} legacy books in {}",
            output.pending_books,
            output.legacy_path.display()
        );
    } else {
        println!("No migration required");
    }
    Ok(())
}

fn run(config: &MigrationConfig, json: bool) -> Result<()> {
    let mut service = open_service(config)?;
    let (reporter, receiver) = ProgressReporter::channel();
    let renderer = thread::spawn(move || render_progress(receiver, !json));

    let outcome = service.run_if_required(&reporter);
    drop(reporter);
    let _ = renderer.join();
    let report = outcome.context("Migration failed; nothing was written, it is safe to retry")?;

    if json {
        let output = RunOutput {
            ran: report.is_some(),
            report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match report {
        None => println!("No migration required"),
        Some(report) => {
            info!(event = "cli_run_finished", rows = report.rows_written());
            println!(
                "Migrated {} books, {} tags, {} links",
                report.books_converted, report.tags_converted, report.associations
            );
            if !report.skipped.is_empty() {
                println!(
                    "Skipped {} books and {} tags:",
                    report.books_skipped, report.tags_skipped
                );
                for skipped in &report.skipped {
                    let id = skipped
                        .legacy_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "<no id>".to_string());
                    println!("- {} {}: {}", skipped.kind, id, skipped.error);
                }
            }
        }
    }
    Ok(())
}

fn render_progress(receiver: Receiver<MigrationProgress>, visible: bool) {
    let mut drew = false;
    for progress in receiver {
        if !visible {
            continue;
        }
        let mut stderr = io::stderr();
        let _ = write!(
            stderr,
            "\rmigrating {}/{} ({:.0}%)",
            progress.current,
            progress.total,
            progress.fraction() * 100.0
        );
        let _ = stderr.flush();
        drew = true;
    }
    if drew {
        eprintln!();
    }
}

fn init_logging() {
    let level = std::env::var("SHELF_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
