//! CLI for extracting Brazilian NFSe data from PDFs and images.

mod format;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use nfse_core::models::config::NfseConfig;
use nfse_core::{ExtractionOptions, NfExtractor};

use format::OutputFormat;

/// Extract structured data from Brazilian service invoices (NFS-e)
#[derive(Parser)]
#[command(name = "nf-extract")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file (PDF, JPG or PNG)
    input: PathBuf,

    /// Directory for the JSON output (default: next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read images with an AI vision model instead of local OCR
    #[arg(long)]
    ai_extraction: bool,

    /// Parse extracted text with an AI model instead of rules
    #[arg(long)]
    ai_parse: bool,

    /// OCR model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Format of the record printed to stdout
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print the record without writing a JSON file
    #[arg(long)]
    no_save: bool,

    /// Report validation issues on stderr
    #[arg(long)]
    validate: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG takes precedence
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(cli.config.as_deref())?;
    resolve_model_dir(&mut config, cli.model_dir.clone());

    let options = ExtractionOptions {
        ai_extraction: cli.ai_extraction,
        ai_parse: cli.ai_parse,
    };

    let extractor = NfExtractor::new(&cli.input, options, config)?;
    info!("Processing {:?} file: {}", extractor.file_type(), cli.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(stage_message(options, extractor.file_type()));

    let nfse = match extractor.extract().await {
        Ok(nfse) => nfse,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e).with_context(|| format!("failed to extract {}", cli.input.display()));
        }
    };

    let saved = if cli.no_save {
        None
    } else {
        pb.set_message("Saving JSON...");
        Some(extractor.save(&nfse, cli.output.as_deref())?)
    };
    pb.finish_and_clear();

    if cli.validate {
        let issues = nfse.validate();
        if issues.is_empty() {
            eprintln!("{} No validation issues", style("✓").green());
        } else {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    println!("{}", format::format_nfse(&nfse, cli.format)?);

    if let Some(path) = saved {
        eprintln!("{} Saved to {}", style("✓").green(), path.display());
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

fn stage_message(options: ExtractionOptions, file_type: nfse_core::FileType) -> &'static str {
    match (file_type, options.ai_extraction, options.ai_parse) {
        (nfse_core::FileType::Image, true, _) => "Reading image with AI vision...",
        (nfse_core::FileType::Image, false, _) => "Running OCR...",
        (nfse_core::FileType::Pdf, _, true) => "Extracting PDF text and parsing with AI...",
        (nfse_core::FileType::Pdf, _, false) => "Extracting PDF text...",
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nf-extract")
        .join("config.json")
}

/// Explicit config file, else the user config file when present, else defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<NfseConfig> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Some(default_config_path()).filter(|p| p.exists()),
    };

    if let Some(p) = &path {
        debug!("Loading configuration from {}", p.display());
    }

    NfseConfig::load(path.as_deref()).context("failed to load configuration")
}

/// `--model-dir` wins; otherwise fall back to the per-user data directory
/// when the configured directory does not exist.
fn resolve_model_dir(config: &mut NfseConfig, cli_dir: Option<PathBuf>) {
    if let Some(dir) = cli_dir {
        config.ocr.model_dir = dir;
        return;
    }

    if !config.ocr.model_dir.exists() {
        if let Some(data_dir) = dirs::data_dir() {
            let candidate = data_dir.join("nf-extract").join("models");
            if candidate.exists() {
                debug!("Using OCR models from {}", candidate.display());
                config.ocr.model_dir = candidate;
            }
        }
    }
}
