//! Error types for the pagemark library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PagemarkError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, missing API key). Returned as
//!   `Err(PagemarkError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch,
//!   OCR call exhausted its retries) but the other pages are fine. Stored
//!   inside [`crate::output::PageResult`] so callers can inspect partial
//!   success rather than losing the whole document to one bad page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagemark library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PagemarkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched nothing in the document.
    #[error("Page selection matches no pages (document has {total} pages)")]
    EmptyPageSelection { total: usize },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── OCR API errors ────────────────────────────────────────────────────
    /// No API key in the config and none of the known env vars are set.
    #[error(
        "OCR API key is not configured.\n\
         Set DASHSCOPE_API_KEY (or PAGEMARK_API_KEY), or pass --api-key."
    )]
    MissingApiKey,

    /// The OCR API rejected the credentials (401/403). Retrying won't help.
    #[error("OCR API authentication failed (HTTP {status}): {detail}\nCheck your API key.")]
    AuthFailed { status: u16, detail: String },

    /// The OCR API returned a non-retryable error.
    #[error("OCR API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Every page failed after all retries; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file or an image.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to the pdfium library: {0}\n\n\
         Install pdfium (https://github.com/bblanchon/pdfium-binaries) and either\n\
         place it next to the binary or set PDFIUM_LIB_PATH=/path/to/dir.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored inside [`crate::output::PageResult`] when a page fails.
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// OCR call failed after retries.
    #[error("Page {page}: OCR failed after {retries} retries: {detail}")]
    OcrFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// OCR call timed out.
    #[error("Page {page}: OCR request timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pages_failed_display() {
        let e = PagemarkError::AllPagesFailed {
            total: 10,
            retries: 3,
            first_error: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 10 pages"), "got: {msg}");
        assert!(msg.contains("HTTP 500"));
    }

    #[test]
    fn auth_failed_display() {
        let e = PagemarkError::AuthFailed {
            status: 401,
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn missing_api_key_names_env_var() {
        let msg = PagemarkError::MissingApiKey.to_string();
        assert!(msg.contains("DASHSCOPE_API_KEY"));
    }

    #[test]
    fn page_error_display() {
        let e = PageError::OcrFailed {
            page: 3,
            retries: 3,
            detail: "rate limited".into(),
        };
        assert!(e.to_string().contains("Page 3"));
        assert!(e.to_string().contains("rate limited"));
    }
}
