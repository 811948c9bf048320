//! CLI binary for pagemark.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagemark::{
    convert, convert_to_file, inspect, parse_page_spec, OcrConfig, OcrMode, PageSeparator,
    Progress, ProgressSink,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress: a spinner while the PDF is opened and rendered, then a
/// page-count bar while the OCR loop runs. Pages arrive strictly in order.
struct CliProgress {
    bar: ProgressBar,
    page_started: std::sync::Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: std::sync::Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl ProgressSink for CliProgress {
    fn on_start(&self, selected_pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {selected_pages} pages…"))
        ));
        self.bar.set_message("rendering pages");
    }

    fn on_rendered(&self, page_count: usize, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {} pages rendered  {}",
            green("✓"),
            page_count,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.activate_bar(page_count);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        *self.page_started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_done(&self, page_num: usize, total: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_page_failed(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.len() > 80 {
            let mut end = 79;
            while !error.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}\u{2026}", &error[..end])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_images_extracted(&self, count: usize) {
        if count > 0 {
            self.bar
                .println(format!("  {} {} images extracted", green("✓"), count));
        }
    }

    fn on_finish(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  pagemark document.pdf

  # Convert to file (writes document.md + images/)
  pagemark document.pdf -o document.md

  # Specific pages, table-tuned prompt
  pagemark --pages 1-5 --ocr-mode table report.pdf -o report.md

  # High DPI for dense scans
  pagemark --dpi 300 scan.pdf -o scan.md

  # Convert from URL
  pagemark https://arxiv.org/pdf/1706.03762 -o attention.md

  # Inspect PDF metadata (no API key needed)
  pagemark --inspect-only document.pdf

  # Skip image extraction, custom separator
  pagemark --no-extract-images --separator hr notes.pdf -o notes.md

OCR MODES:
  academic   Papers: formulas, citations, figure captions  (default)
  document   General documents: reports, letters, manuals
  table      Table-dense pages: forms, statements
  formula    Formula-dense pages: textbooks, derivations
  mixed      Unknown or varied content

ENVIRONMENT VARIABLES:
  DASHSCOPE_API_KEY   OCR API key (required unless --api-key is given)
  PAGEMARK_API_KEY    Fallback API key variable
  PDFIUM_LIB_PATH     Directory holding the pdfium shared library

SETUP:
  1. Install pdfium:  https://github.com/bblanchon/pdfium-binaries
  2. Set API key:     export DASHSCOPE_API_KEY=sk-...
  3. Convert:         pagemark document.pdf -o document.md
"#;

/// Convert PDF files and URLs to Markdown using vision-language OCR.
#[derive(Parser, Debug)]
#[command(
    name = "pagemark",
    version,
    about = "Convert PDF files and URLs to Markdown using vision-language OCR",
    long_about = "Convert PDF documents (local files or URLs) to clean Markdown by rendering \
each page and sending it to a hosted vision-language OCR model. Embedded images are \
extracted to an images/ subdirectory next to the output file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PAGEMARK_OUTPUT")]
    output: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5-7.
    #[arg(long, env = "PAGEMARK_PAGES", default_value = "all")]
    pages: String,

    /// First page to convert (1-indexed); overrides --pages with --last-page.
    #[arg(long)]
    first_page: Option<usize>,

    /// Last page to convert (inclusive); overrides --pages with --first-page.
    #[arg(long)]
    last_page: Option<usize>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PAGEMARK_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Per-request OCR timeout in seconds.
    #[arg(long, env = "PAGEMARK_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Prompt template: document, academic, table, formula, mixed.
    #[arg(long, env = "PAGEMARK_OCR_MODE", default_value = "academic")]
    ocr_mode: String,

    /// Extra instructions appended to the prompt template.
    #[arg(long, env = "PAGEMARK_CUSTOM_PROMPT")]
    custom_prompt: Option<String>,

    /// Do not extract embedded or data-URL images.
    #[arg(long)]
    no_extract_images: bool,

    /// Enhance page images (contrast + sharpen) before OCR.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    enhance_images: bool,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PAGEMARK_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max model output tokens per page.
    #[arg(long, env = "PAGEMARK_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Retries per page on transient OCR failure.
    #[arg(long, env = "PAGEMARK_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// OCR model identifier.
    #[arg(long, env = "PAGEMARK_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "PAGEMARK_BASE_URL")]
    base_url: Option<String>,

    /// OCR API key (prefer the DASHSCOPE_API_KEY env var).
    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAGEMARK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Page separator: heading, hr, comment, none, or a custom string.
    #[arg(long, env = "PAGEMARK_SEPARATOR", default_value = "heading")]
    separator: String,

    /// Omit the metadata header block.
    #[arg(long)]
    no_header: bool,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PAGEMARK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGEMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGEMARK_QUIET")]
    quiet: bool,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "PAGEMARK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs duplicate the progress bar's feedback, so they are
    // suppressed unless the bar is off or --verbose asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<Progress> = if show_progress {
        Some(CliProgress::new() as Progress)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(&cli.input, output_path, &config)
            .await
            .context("Conversion failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {} images  {}ms  →  {}",
                if stats.failed_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.processed_pages,
                stats.processed_pages + stats.failed_pages,
                stats.images_extracted,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    } else {
        let output = convert(&cli.input, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<Progress>) -> Result<OcrConfig> {
    let pages = match (cli.first_page, cli.last_page) {
        (Some(first), Some(last)) => {
            anyhow::ensure!(first >= 1, "Pages are 1-indexed, minimum is 1");
            anyhow::ensure!(first <= last, "--first-page must be <= --last-page");
            pagemark::PageSelection::Range(first, last)
        }
        (Some(first), None) => {
            anyhow::ensure!(first >= 1, "Pages are 1-indexed, minimum is 1");
            pagemark::PageSelection::Range(first, usize::MAX)
        }
        (None, Some(last)) => pagemark::PageSelection::Range(1, last),
        (None, None) => parse_page_spec(&cli.pages).context("Invalid --pages value")?,
    };

    let mode: OcrMode = cli
        .ocr_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut builder = OcrConfig::builder()
        .dpi(cli.dpi)
        .timeout_secs(cli.timeout)
        .mode(mode)
        .pages(pages)
        .separator(parse_separator(&cli.separator))
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .enhance_images(cli.enhance_images)
        .extract_images(!cli.no_extract_images)
        .include_header(!cli.no_header)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref extra) = cli.custom_prompt {
        builder = builder.custom_prompt(extra.clone());
    }
    if let Some(p) = progress {
        builder = builder.progress(p);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "heading" => PageSeparator::Heading,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        "none" => PageSeparator::None,
        custom => PageSeparator::Custom(custom.to_string()),
    }
}
