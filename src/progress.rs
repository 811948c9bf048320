//! Progress-event trait for per-page conversion updates.
//!
//! Inject an `Arc<dyn ProgressSink>` via
//! [`crate::config::OcrConfigBuilder::progress`] to receive events as the
//! pipeline works through the document. The CLI forwards these to an
//! indicatif progress bar; other hosts can forward them to a channel, a log,
//! or a UI without the library knowing anything about the transport.
//!
//! Pages are processed strictly one at a time, so events for a given run
//! arrive in order, but the trait is still `Send + Sync` because the
//! pipeline crosses `spawn_blocking` boundaries.

use std::sync::Arc;

/// Receives pipeline events during a conversion.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProgressSink: Send + Sync {
    /// Called once after the page selection is known, before any rendering.
    fn on_start(&self, selected_pages: usize) {
        let _ = selected_pages;
    }

    /// Called after all selected pages have been rasterised.
    fn on_rendered(&self, page_count: usize, elapsed_ms: u64) {
        let _ = (page_count, elapsed_ms);
    }

    /// Called just before the OCR request for a page is sent.
    fn on_page_start(&self, page_num: usize, total: usize) {
        let _ = (page_num, total);
    }

    /// Called when a page's Markdown has been produced.
    fn on_page_done(&self, page_num: usize, total: usize, markdown_len: usize) {
        let _ = (page_num, total, markdown_len);
    }

    /// Called when a page fails after all retries are exhausted.
    fn on_page_failed(&self, page_num: usize, total: usize, error: &str) {
        let _ = (page_num, total, error);
    }

    /// Called after embedded-image extraction (only when enabled).
    fn on_images_extracted(&self, count: usize) {
        let _ = count;
    }

    /// Called once after assembly, whether or not every page succeeded.
    fn on_finish(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op sink for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type Progress = Arc<dyn ProgressSink>;
