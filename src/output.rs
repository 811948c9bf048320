//! Output types returned by the conversion entry points.
//!
//! Everything here derives `Serialize` so the CLI `--json` mode and the MCP
//! tool can emit results without any intermediate mapping layer.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The result of converting a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number in the source document.
    pub page_num: usize,

    /// The Markdown produced for this page (empty when `error` is set).
    pub markdown: String,

    /// Prompt tokens reported by the OCR API for this page.
    pub input_tokens: u32,

    /// Completion tokens reported by the OCR API for this page.
    pub output_tokens: u32,

    /// Wall-clock milliseconds spent on the OCR call(s) for this page.
    pub duration_ms: u64,

    /// Number of retries that were needed (0 = first attempt succeeded).
    pub retries: u32,

    /// Set when the page failed after all retries.
    pub error: Option<PageError>,
}

/// Document-level metadata read from the PDF without rendering any page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    /// Total number of pages in the document.
    pub page_count: usize,
    /// PDF version string, e.g. "Pdf17".
    pub pdf_version: String,
}

/// An embedded image pulled out of the PDF's page objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// 1-indexed page the image came from.
    pub page_num: usize,
    /// 1-indexed position of the image within its page.
    pub index: usize,
    /// File name under the image subdirectory, e.g. `page_3_img_1.png`.
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Aggregate counters for a completed conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Total pages in the source document.
    pub total_pages: usize,
    /// Pages that were selected and converted successfully.
    pub processed_pages: usize,
    /// Selected pages that failed after all retries.
    pub failed_pages: usize,
    /// Images written to the image subdirectory (embedded + data-URL offloads).
    pub images_extracted: usize,
    /// Total prompt tokens across all pages.
    pub total_input_tokens: u64,
    /// Total completion tokens across all pages.
    pub total_output_tokens: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent rasterising pages.
    pub render_duration_ms: u64,
    /// Time spent in OCR API calls.
    pub ocr_duration_ms: u64,
}

/// Full result of an in-memory conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The assembled Markdown document.
    pub markdown: String,
    /// Per-page results, sorted by page number.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}
