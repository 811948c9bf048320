//! Embedded-image extraction from PDF page objects.
//!
//! Pages often carry figures as embedded raster objects that the OCR model
//! can only describe, not reproduce. This stage walks the selected pages'
//! object lists, decodes each image object through pdfium, and writes it as a
//! PNG under the output's image subdirectory so the assembled Markdown can
//! link to the real figure.
//!
//! A failed individual image is logged and skipped; extraction is best-effort
//! and never fails the conversion.

use crate::error::PagemarkError;
use crate::output::ExtractedImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::render::bind_pdfium;

/// Extract embedded images from the selected pages into `images_dir`.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
///
/// # Returns
/// One [`ExtractedImage`] per written file, in page order. The list is empty
/// (not an error) when the document has no extractable images.
pub async fn extract_embedded_images(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
    images_dir: &Path,
) -> Result<Vec<ExtractedImage>, PagemarkError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let indices = page_indices.to_vec();
    let dir = images_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        extract_embedded_images_blocking(&path, pwd.as_deref(), &indices, &dir)
    })
    .await
    .map_err(|e| PagemarkError::Internal(format!("Extract task panicked: {}", e)))?
}

fn extract_embedded_images_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
    images_dir: &Path,
) -> Result<Vec<ExtractedImage>, PagemarkError> {
    std::fs::create_dir_all(images_dir).map_err(|e| PagemarkError::OutputWriteFailed {
        path: images_dir.to_path_buf(),
        source: e,
    })?;

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| PagemarkError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let mut extracted = Vec::new();

    for &idx in page_indices {
        if idx >= total_pages {
            continue;
        }
        let page_num = idx + 1;

        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("Page {}: cannot open for image extraction: {:?}", page_num, e);
                continue;
            }
        };

        let mut img_index = 0usize;
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };

            img_index += 1;
            match image_object.get_raw_image() {
                Ok(raw) => {
                    let filename = image_filename(page_num, img_index);
                    let file_path: PathBuf = images_dir.join(&filename);
                    if let Err(e) = raw.save_with_format(&file_path, image::ImageFormat::Png) {
                        warn!(
                            "Page {}: failed to write image {}: {}",
                            page_num, img_index, e
                        );
                        continue;
                    }
                    debug!("Saved embedded image: {}", file_path.display());
                    extracted.push(ExtractedImage {
                        page_num,
                        index: img_index,
                        filename,
                        width: raw.width(),
                        height: raw.height(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Page {}: failed to decode image object {}: {:?}",
                        page_num, img_index, e
                    );
                }
            }
        }
    }

    info!(
        "Extracted {} embedded images from {} pages",
        extracted.len(),
        page_indices.len()
    );
    Ok(extracted)
}

/// File name for an embedded image: `page_{n}_img_{i}.png`.
pub fn image_filename(page_num: usize, img_index: usize) -> String {
    format!("page_{}_img_{}.png", page_num, img_index)
}
