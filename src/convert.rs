//! Conversion entry points.
//!
//! The pipeline is three sequential, stateless steps — render pages, call the
//! OCR endpoint per page, assemble the text — so the orchestration here is a
//! plain loop, one page at a time. There is deliberately no concurrency: the
//! hosted endpoint rate-limits aggressively, and a document's pages arrive in
//! order without any sorting step.

use crate::config::OcrConfig;
use crate::error::{PageError, PagemarkError};
use crate::output::{
    ConversionOutput, ConversionStats, DocumentMetadata, ExtractedImage, PageResult,
};
use crate::pipeline::{assemble, encode, extract, input, ocr, postprocess, preprocess, render};
use crate::prompts;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Convert a PDF file or URL to Markdown in memory.
///
/// No filesystem output is produced: embedded-image extraction is skipped and
/// any data-URL figures the model emits stay inline. Use
/// [`convert_to_file`] for the full treatment.
///
/// # Errors
/// Returns `Err(PagemarkError)` only for fatal conditions — unreadable input,
/// missing API key, authentication failure, or every page failing. Individual
/// page failures are recorded in `output.pages[..].error`.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &OcrConfig,
) -> Result<ConversionOutput, PagemarkError> {
    run_conversion(input_str.as_ref(), config, None).await
}

/// Convert a PDF file or URL to a Markdown file on disk.
///
/// Writes `output_path` atomically (temp file + rename). When
/// `config.extract_images` is set, embedded PDF images and data-URL figures
/// are written to `<output_dir>/<image_subdir>/` and linked relatively.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &OcrConfig,
) -> Result<ConversionStats, PagemarkError> {
    let path = output_path.as_ref();
    let output = run_conversion(input_str.as_ref(), config, Some(path)).await?;
    assemble::write_markdown_atomic(path, &output.markdown).await?;
    info!("Markdown written to: {}", path.display());
    Ok(output.stats)
}

/// Extract PDF metadata without converting content.
///
/// Does not require an API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, PagemarkError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), None).await
}

// ── Internal orchestration ───────────────────────────────────────────────

async fn run_conversion(
    input_str: &str,
    config: &OcrConfig,
    output_target: Option<&Path>,
) -> Result<ConversionOutput, PagemarkError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let source_name = display_name(input_str);

    // ── Step 2: OCR client (fails fast on a missing API key) ─────────────
    let client = ocr::OcrClient::new(config)?;

    // ── Step 3: Metadata + page selection ────────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(PagemarkError::EmptyPageSelection { total: total_pages });
    }

    if let Some(ref p) = config.progress {
        p.on_start(page_indices.len());
    }

    // ── Step 4: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);
    if let Some(ref p) = config.progress {
        p.on_rendered(rendered.len(), render_duration_ms);
    }

    // ── Step 5: OCR, one page at a time ──────────────────────────────────
    let prompt = prompts::build_prompt(config.mode, config.custom_prompt.as_deref());
    let selected = rendered.len();
    let ocr_start = Instant::now();
    let mut pages: Vec<PageResult> = Vec::with_capacity(selected);

    for (idx, image) in rendered {
        let page_num = idx + 1;
        if let Some(ref p) = config.progress {
            p.on_page_start(page_num, selected);
        }

        let enhanced = preprocess::enhance_page(image, config.enhance_images);
        let result = match encode::encode_page(&enhanced) {
            Ok(data_url) => {
                let mut r = client
                    .recognize_page(page_num, &data_url, &prompt, config)
                    .await?;
                if r.error.is_none() {
                    r.markdown = postprocess::clean_page_markdown(&r.markdown);
                }
                r
            }
            Err(e) => {
                warn!("Page {}: image encoding failed: {}", page_num, e);
                PageResult {
                    page_num,
                    markdown: String::new(),
                    input_tokens: 0,
                    output_tokens: 0,
                    duration_ms: 0,
                    retries: 0,
                    error: Some(PageError::RenderFailed {
                        page: page_num,
                        detail: format!("image encoding failed: {}", e),
                    }),
                }
            }
        };

        if let Some(ref p) = config.progress {
            match &result.error {
                None => p.on_page_done(page_num, selected, result.markdown.len()),
                Some(e) => p.on_page_failed(page_num, selected, &e.to_string()),
            }
        }
        pages.push(result);
    }
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    let failed = pages.len() - processed;
    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(PagemarkError::AllPagesFailed {
            total: pages.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    // ── Step 6: Image extraction (file output only) ──────────────────────
    let mut embedded: Vec<ExtractedImage> = Vec::new();
    let mut offloaded = 0usize;

    if let Some(output_path) = output_target {
        if config.extract_images {
            let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
            let images_dir = output_dir.join(&config.image_subdir);

            embedded = extract::extract_embedded_images(
                &pdf_path,
                config.password.as_deref(),
                &page_indices,
                &images_dir,
            )
            .await?;

            for page in pages.iter_mut().filter(|p| p.error.is_none()) {
                let next_index = embedded
                    .iter()
                    .filter(|img| img.page_num == page.page_num)
                    .count()
                    + 1;
                let (rewritten, saved) = assemble::offload_data_url_images(
                    &page.markdown,
                    page.page_num,
                    next_index,
                    &images_dir,
                    &config.image_subdir,
                );
                page.markdown = rewritten;
                offloaded += saved.len();
            }

            if let Some(ref p) = config.progress {
                p.on_images_extracted(embedded.len() + offloaded);
            }
        }
    }

    // ── Step 7: Assemble ─────────────────────────────────────────────────
    let markdown = assemble::assemble_document(&pages, &metadata, config, &source_name, &embedded);

    let stats = ConversionStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        images_extracted: embedded.len() + offloaded,
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        ocr_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} images, {}ms total",
        processed,
        selected,
        stats.images_extracted,
        stats.total_duration_ms
    );
    if let Some(ref p) = config.progress {
        p.on_finish(selected, processed);
    }

    Ok(ConversionOutput {
        markdown,
        pages,
        metadata,
        stats,
    })
}

/// The name shown in the document header: the file-name portion of a path,
/// or the last segment of a URL.
fn display_name(input_str: &str) -> String {
    if input::is_url(input_str) {
        input_str
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(input_str)
            .to_string()
    } else {
        Path::new(input_str)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input_str.to_string())
    }
}
