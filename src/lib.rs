//! # pagemark
//!
//! Convert PDF documents to Markdown with a hosted vision-language OCR API.
//!
//! ## Why this crate?
//!
//! Traditional PDF text extractors (pdftotext, pdf-extract) fail on scans and
//! complex layouts — multi-column text, tables, and formulas come out garbled
//! or in the wrong order. pagemark instead rasterises each page to a PNG and
//! lets a vision-language model read it as a human would, producing
//! structured Markdown that survives tables, math, and mixed-language text.
//!
//! ## Pipeline
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Enhance   optional contrast + sharpen pass
//!  ├─ 4. Encode    PNG → base64 data URL
//!  ├─ 5. OCR       one call per page to the vision endpoint, in page order
//!  ├─ 6. Clean     deterministic Markdown cleanup
//!  ├─ 7. Images    embedded PDF images + data-URL figures → images/ dir
//!  └─ 8. Assemble  header + page separators + image links
//! ```
//!
//! Pages are processed strictly one at a time; the hosted endpoint is the
//! bottleneck and its rate limits make client-side parallelism a net loss.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pagemark::{convert_to_file, OcrConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from DASHSCOPE_API_KEY
//!     let config = OcrConfig::default();
//!     let stats = convert_to_file("paper.pdf", "paper.md", &config).await?;
//!     eprintln!("{}/{} pages converted", stats.processed_pages, stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | The `pagemark` binary (clap + indicatif + anyhow) |
//! | `mcp`   | on      | The `pagemark-mcp` binary (rmcp stdio server) |
//!
//! Disable both when using only the library:
//! ```toml
//! pagemark = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

#[cfg(feature = "mcp")]
pub mod mcp;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{parse_page_spec, OcrConfig, OcrConfigBuilder, PageSelection, PageSeparator};
pub use convert::{convert, convert_to_file, inspect};
pub use error::{PageError, PagemarkError};
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, ExtractedImage, PageResult,
};
pub use progress::{NoopProgress, Progress, ProgressSink};
pub use prompts::OcrMode;
