use clap::{Parser, Subcommand};
use snap_serve::batch::BatchEvent;
use snap_serve::config::{self, ServiceConfig};
use snap_serve::output;
use snap_serve::service::{FilterService, build_services};
use snap_serve::types::{BatchReport, BatchStatus, UploadFile};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "snap-serve")]
#[command(about = "Batch image filters over object storage")]
#[command(long_about = "\
Batch image filters over object storage

Upload images, then apply filters to any of them by public URL. Every image
is processed independently: a bad URL or an oversize image fails on its own
and the rest of the batch carries on.

Filters (applied in this order, whatever order they are given in):

  resize=<w>x<h>             0 keeps aspect ratio, max 4000x4000
  crop_to_size=<w>x<h>       left-anchored, vertically centred
  rotate=<degrees>           -360..360, counter-clockwise
  brightness_increase=<p>    0..100 (also _decrease)
  contrast_increase=<p>      0..100 (also _decrease)
  saturation_increase=<p>    0..200 (also _decrease)
  gaussian_blur=<sigma>      0.1..50
  pixelate=<size>            0..50
  grayscale=<any>
  invert=<any>

Exit status: 0 all stored and recorded, 2 partial success, 1 failure.

Run 'snap-serve gen-config' to generate a documented snap-serve.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "snap-serve.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that run a batch.
#[derive(clap::Args, Clone)]
struct BatchArgs {
    /// Owner the stored images are recorded for
    #[arg(long)]
    owner: u64,

    /// Write a JSON report to this file ("-" for stdout)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Don't print per-item progress
    #[arg(long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload image files (or directories of them) and record them
    Upload {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Apply filters to uploaded images by public URL
    Apply {
        /// Public URLs of uploaded images
        #[arg(required = true)]
        urls: Vec<String>,

        /// Filter as key=value; repeatable
        #[arg(short, long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// List supported filter keys
    Filters,
    /// List recorded images
    Records {
        /// Only this owner's images
        #[arg(long)]
        owner: Option<u64>,
    },
    /// Print a stock snap-serve.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Filters => {
            output::print_filter_list();
            return Ok(ExitCode::SUCCESS);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = config::load_config(&cli.config)?;
    init_logging(&config);
    let (services, records) = build_services(&config)?;

    match cli.command {
        Command::Upload { paths, batch } => {
            let files = collect_files(&paths)?;
            let service = FilterService::from_config(services, &config)?;
            let (events, printer) = progress_printer(batch.quiet);
            let report = service.upload(&files, batch.owner, events);
            join_printer(printer);
            finish(report?, &batch)
        }
        Command::Apply {
            urls,
            filters,
            batch,
        } => {
            let service = FilterService::from_config(services, &config)?;
            let (events, printer) = progress_printer(batch.quiet);
            let report = service.apply(&urls, filters, batch.owner, events);
            join_printer(printer);
            finish(report?, &batch)
        }
        Command::Records { owner } => {
            let rows = match owner {
                Some(owner) => records.for_owner(owner),
                None => records.all(),
            };
            output::print_records(&rows);
            Ok(ExitCode::SUCCESS)
        }
        Command::Filters | Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over `logging.filter`.
fn init_logging(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Spawn a thread that prints batch events as they arrive.
fn progress_printer(quiet: bool) -> (Option<Sender<BatchEvent>>, Option<JoinHandle<()>>) {
    if quiet {
        return (None, None);
    }
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_batch_event(&event) {
                println!("{}", line);
            }
        }
    });
    (Some(tx), Some(printer))
}

fn join_printer(printer: Option<JoinHandle<()>>) {
    if let Some(printer) = printer {
        // The sender was moved into the batch and is gone by now
        let _ = printer.join();
    }
}

fn finish(report: BatchReport, batch: &BatchArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    output::print_report(&report);
    if let Some(path) = &batch.report {
        let json = serde_json::to_string_pretty(&output::report_json(&report))?;
        if path == Path::new("-") {
            println!("{}", json);
        } else {
            std::fs::write(path, json)?;
        }
    }
    Ok(match report.status() {
        BatchStatus::Success => ExitCode::SUCCESS,
        BatchStatus::PartialSuccess => ExitCode::from(2),
        BatchStatus::Failure => ExitCode::FAILURE,
    })
}

/// Expand directories (recursively) and read every file.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            files.push(UploadFile {
                name,
                bytes: std::fs::read(entry.path())?,
            });
        }
    }
    Ok(files)
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        // Flag-style filters like `-f grayscale`
        None if !raw.trim().is_empty() => Ok((raw.trim().to_string(), String::new())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
