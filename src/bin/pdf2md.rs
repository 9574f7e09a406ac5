//! CLI binary for ocr-pdf2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, runs one of the collaborator operations and prints the
//! result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ocr_pdf2md::{
    ConversionProgressCallback, ConversionResult, Converter, ConverterConfig, ProgressCallback,
    Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that names the stage a request is sitting in. OCR of a
/// long scan can run for minutes, so the stage name is the useful feedback.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Classify => "Checking for a text layer…",
        Stage::Extract => "Extracting text (OCR if scanned)…",
        Stage::Structure => "Structuring Markdown…",
        Stage::Persist => "Saving…",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, source: &Path) {
        self.bar.reset_elapsed();
        self.bar.set_prefix(
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(stage_label(stage));
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar
            .println(format!("  {} {}", green("✓"), dim(stage.as_str())));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {}  {}", red("✗"), stage.as_str(), red(msg)));
    }

    fn on_conversion_complete(&self, _result: &ConversionResult) {
        self.bar.set_message("");
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a file from the upload area (relative paths resolve there)
  pdf2md convert report.pdf

  # Convert several files into a custom directory, JSON results
  pdf2md --json convert a.pdf /tmp/scan.pdf -o ./markdown

  # Copy a PDF into the upload area and register it
  pdf2md ingest ~/Downloads/invoice.pdf --delete-after

  # Is a file in the upload area?
  pdf2md status invoice.pdf

  # Everything processed so far
  pdf2md list

LAYOUT (under --root, default "."):
  uploaded/              upload area
  output/                <stem>.md files
  temp/                  per-request OCR artifacts
  processed_files.json   processed-file registry

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH        Path to libpdfium
  RUST_LOG               Overrides the log filter (e.g. ocr_pdf2md=debug)
  PDF2MD_*               Fallback for every long flag (see --help)

REQUIREMENTS:
  Scanned PDFs need ocrmypdf and the Tesseract language packs named by
  --ocr-languages (default vie+eng).
"#;

/// Convert text-native and scanned PDFs to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md",
    version,
    about = "Convert text-native and scanned PDFs to Markdown",
    long_about = "Convert PDF documents to Markdown. Documents without a text layer on \
their first page are run through ocrmypdf first. Tables are rendered as Markdown tables \
and every converted file is recorded in a JSON registry.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Project root holding uploaded/, output/, temp/ and processed_files.json.
    #[arg(long, global = true, env = "PDF2MD_ROOT", default_value = ".")]
    root: PathBuf,

    /// Override the upload area.
    #[arg(long, global = true, env = "PDF2MD_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Override the output directory.
    #[arg(long, global = true, env = "PDF2MD_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Override the temp area for OCR artifacts.
    #[arg(long, global = true, env = "PDF2MD_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Override the registry file.
    #[arg(long, global = true, env = "PDF2MD_REGISTRY")]
    registry: Option<PathBuf>,

    /// Tesseract languages, '+'-separated.
    #[arg(long, global = true, env = "PDF2MD_OCR_LANGUAGES", default_value = "vie+eng")]
    ocr_languages: String,

    /// OCR timeout in seconds.
    #[arg(long, global = true, env = "PDF2MD_OCR_TIMEOUT", default_value_t = 600)]
    ocr_timeout: u64,

    /// ocrmypdf executable.
    #[arg(long, global = true, env = "PDF2MD_OCRMYPDF", default_value = "ocrmypdf")]
    ocrmypdf: String,

    /// Only OCR pages without text instead of re-OCRing every page.
    #[arg(long, global = true, env = "PDF2MD_SKIP_TEXT")]
    skip_text: bool,

    /// Public URL prefix for download references (e.g. http://localhost:8001/output).
    #[arg(long, global = true, env = "PDF2MD_DOWNLOAD_BASE_URL")]
    download_base_url: Option<String>,

    /// Path to libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true, env = "PDF2MD_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one or more PDFs to Markdown.
    Convert {
        /// PDF paths; relative paths resolve against the upload area.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write Markdown here instead of the configured output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy a PDF into the upload area and register it.
    Ingest {
        file: PathBuf,

        /// Delete the source after copying.
        #[arg(long)]
        delete_after: bool,
    },

    /// Report whether a file is present in the upload area.
    Status { filename: String },

    /// List every registered file name.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let is_convert = matches!(cli.command, Command::Convert { .. });
    let show_progress = is_convert && !g.quiet && !g.no_progress && !g.json;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(g, progress_cb)?;
    // Only conversions read PDFs; the other commands must work without pdfium.
    let converter = if is_convert {
        Converter::new(config).await
    } else {
        Converter::deferred(config).await
    }
    .context("Failed to start converter")?;

    match cli.command {
        Command::Convert { inputs, output } => {
            let mut failed = 0usize;
            let mut results = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let path = converter.resolve_input(input);
                let result = match &output {
                    Some(dir) => converter.convert_into(&path, dir).await,
                    None => converter.convert(&path).await,
                };
                if !result.is_success() {
                    failed += 1;
                }
                if !g.json && !g.quiet {
                    print_result(&result);
                }
                results.push(result);
            }

            if g.json {
                let json = if results.len() == 1 {
                    serde_json::to_string_pretty(&results[0])
                } else {
                    serde_json::to_string_pretty(&results)
                }
                .context("Failed to serialise results")?;
                println!("{json}");
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} conversions failed", inputs.len());
            }
        }

        Command::Ingest { file, delete_after } => {
            let receipt = converter
                .ingest(&file, delete_after)
                .await
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
            if g.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&receipt).context("Failed to serialise receipt")?
                );
            } else if !g.quiet {
                println!(
                    "{} {} → {}{}",
                    green("✔"),
                    bold(&receipt.filename),
                    receipt.path.display(),
                    if receipt.newly_registered {
                        String::new()
                    } else {
                        dim("  (already registered)")
                    }
                );
            }
        }

        Command::Status { filename } => {
            let exists = converter.file_status(&filename).await;
            if g.json {
                println!("{}", serde_json::json!({ "exists": exists }));
            } else {
                println!("{filename}: {}", if exists { "present" } else { "missing" });
            }
        }

        Command::List => {
            let files = converter
                .registry()
                .list_all()
                .await
                .context("Failed to read registry")?;
            if g.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&files).context("Failed to serialise list")?
                );
            } else {
                for f in files {
                    println!("{f}");
                }
            }
        }
    }

    Ok(())
}

fn print_result(result: &ConversionResult) {
    if result.is_success() {
        let dest = result
            .output_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let kind = match result.scanned {
            Some(true) => dim("  (OCR)"),
            _ => String::new(),
        };
        eprintln!("{}  {}{}", green("✔"), bold(&dest), kind);
        if let Some(url) = &result.download_url {
            eprintln!("   {}", dim(url));
        }
    } else {
        eprintln!("{}  {}", red("✘"), result.message);
    }
}

/// Map CLI args to `ConverterConfig`.
fn build_config(g: &GlobalArgs, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .root(&g.root)
        .ocr_languages(&g.ocr_languages)
        .ocr_timeout(Duration::from_secs(g.ocr_timeout))
        .ocrmypdf_path(&g.ocrmypdf)
        .force_ocr(!g.skip_text);

    if let Some(dir) = &g.upload_dir {
        builder = builder.upload_dir(dir);
    }
    if let Some(dir) = &g.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(dir) = &g.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(path) = &g.registry {
        builder = builder.registry_path(path);
    }
    if let Some(url) = &g.download_base_url {
        builder = builder.download_base_url(url);
    }
    if let Some(lib) = &g.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_convert_with_output_dir() {
        let cli = Cli::try_parse_from(["pdf2md", "--json", "convert", "a.pdf", "b.pdf", "-o", "md"])
            .unwrap();
        assert!(cli.global.json);
        match cli.command {
            Command::Convert { inputs, output } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(output, Some(PathBuf::from("md")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn skip_text_disables_force_ocr() {
        let cli = Cli::try_parse_from(["pdf2md", "--skip-text", "list"]).unwrap();
        let config = build_config(&cli.global, None).unwrap();
        assert!(!config.force_ocr);
        assert_eq!(config.ocr_languages, "vie+eng");
    }
}
