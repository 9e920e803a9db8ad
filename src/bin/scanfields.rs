//! CLI binary for scanfields.
//!
//! A thin shim over the library crate that maps CLI flags to an
//! [`ExtractionConfig`] and prints the extraction result as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanfields::{extract_fields, extract_text, ExtractionConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Extract structured fields from a scanned PDF with OCR and a local LLM.
#[derive(Parser, Debug)]
#[command(name = "scanfields", version, about, long_about = None)]
struct Cli {
    /// Path to the PDF document.
    pdf: PathBuf,

    /// Extraction instruction for the model, e.g.
    /// "Extract the contract parties and the total amount."
    #[arg(short, long, required_unless_present = "ocr_only")]
    prompt: Option<String>,

    /// Only run OCR and print the recognised text; skip the LLM stage.
    #[arg(long)]
    ocr_only: bool,

    /// Directory holding Tesseract traineddata files.
    #[arg(long, env = "SCANFIELDS_TESSDATA", default_value = "./tessdata")]
    tessdata: PathBuf,

    /// OCR language identifier, e.g. "eng" or "tur+eng".
    #[arg(long, env = "SCANFIELDS_LANG", default_value = "eng")]
    lang: String,

    /// Rendering DPI for page rasterisation (72–600).
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Base URL of the LLM chat endpoint.
    #[arg(long, env = "SCANFIELDS_BASE_URL", default_value = "http://localhost:11434")]
    base_url: String,

    /// Model identifier for the chat endpoint.
    #[arg(long, env = "SCANFIELDS_MODEL", default_value = "llama3.1")]
    model: String,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scanfields=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let pdf = std::fs::read(&cli.pdf)
        .with_context(|| format!("failed to read '{}'", cli.pdf.display()))?;
    let file_name = cli
        .pdf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.pdf".to_string());

    let config = ExtractionConfig::builder()
        .tessdata_path(&cli.tessdata)
        .language(cli.lang.as_str())
        .dpi(cli.dpi)
        .base_url(cli.base_url.as_str())
        .model(cli.model.as_str())
        .build()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let spinner = make_spinner(if cli.ocr_only {
        "Running OCR…"
    } else {
        "Extracting fields…"
    });

    if cli.ocr_only {
        let text = extract_text(&pdf, &config).await;
        spinner.finish_and_clear();
        let text = text.map_err(|e| anyhow::anyhow!("{e}"))?;
        write_output(cli.output.as_deref(), &text)?;
        return Ok(());
    }

    let prompt = cli.prompt.expect("clap enforces prompt unless --ocr-only");
    let result = extract_fields(&pdf, &file_name, &prompt, &config).await;
    spinner.finish_and_clear();

    let json = serde_json::to_string_pretty(&result).context("serialising result")?;
    write_output(cli.output.as_deref(), &json)?;

    if !result.success {
        bail!(
            "extraction failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn make_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn write_output(path: Option<&std::path::Path>, content: &str) -> Result<()> {
    match path {
        Some(p) => std::fs::write(p, content)
            .with_context(|| format!("failed to write '{}'", p.display()))?,
        None => println!("{content}"),
    }
    Ok(())
}
