//! Document assembly: join page fragments into the final Markdown file.
//!
//! Three concerns live here:
//!
//! * **Data-URL offload** — some pages come back with figures inlined as
//!   `![alt](data:image/png;base64,…)`. Left in place they bloat the file by
//!   megabytes and break most Markdown viewers, so each one is decoded to a
//!   file under the image subdirectory and the link rewritten to a relative
//!   path.
//! * **Header** — an optional blockquote identifying the source document and
//!   the generator.
//! * **Separators** — the configured [`PageSeparator`] between fragments,
//!   with failed pages kept as HTML comment markers so page alignment
//!   survives partial failure.

use crate::config::{OcrConfig, PageSeparator};
use crate::error::PagemarkError;
use crate::output::{DocumentMetadata, ExtractedImage, PageResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Matches a Markdown image whose target is a base64 data URL:
/// `![alt](data:image/<format>;base64,<payload>)`.
static RE_DATA_URL_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:image/(\w+);base64,([A-Za-z0-9+/=\s]+)\)").unwrap()
});

/// Decode data-URL images out of one page's Markdown into `images_dir`.
///
/// `next_index` continues the page's image numbering after any embedded
/// images already extracted for it, so filenames never collide.
///
/// Returns the rewritten Markdown and one [`ExtractedImage`] per file
/// written. An image that fails to decode or write is left inline and
/// logged — losing a figure beats losing the page.
pub fn offload_data_url_images(
    markdown: &str,
    page_num: usize,
    next_index: usize,
    images_dir: &Path,
    image_subdir: &str,
) -> (String, Vec<ExtractedImage>) {
    let mut saved = Vec::new();
    let mut index = next_index;

    let rewritten = RE_DATA_URL_IMAGE.replace_all(markdown, |caps: &regex::Captures<'_>| {
        let alt = &caps[1];
        let format = caps[2].to_ascii_lowercase();
        // Models wrap long base64 runs; strip the whitespace before decoding.
        let payload: String = caps[3].chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = match STANDARD.decode(payload.as_bytes()) {
            Ok(b) => b,
            Err(e) => {
                warn!("Page {}: undecodable data-URL image: {}", page_num, e);
                return caps[0].to_string();
            }
        };

        let filename = format!("page_{}_img_{}.{}", page_num, index, format);
        let file_path = images_dir.join(&filename);
        if let Err(e) = std::fs::write(&file_path, &bytes) {
            warn!("Page {}: failed to write {}: {}", page_num, filename, e);
            return caps[0].to_string();
        }
        debug!("Offloaded data-URL image: {}", file_path.display());

        saved.push(ExtractedImage {
            page_num,
            index,
            filename: filename.clone(),
            width: 0,
            height: 0,
        });
        index += 1;

        format!("![{}]({}/{})", alt, image_subdir, filename)
    });

    (rewritten.into_owned(), saved)
}

/// Assemble the final Markdown document from page results.
///
/// `embedded` holds images pulled from the PDF itself; each is linked after
/// its owning page's fragment. Pass an empty slice for in-memory conversions.
pub fn assemble_document(
    pages: &[PageResult],
    metadata: &DocumentMetadata,
    config: &OcrConfig,
    source_name: &str,
    embedded: &[ExtractedImage],
) -> String {
    let mut doc = String::new();

    if config.include_header {
        doc.push_str(&render_header(metadata, source_name, pages));
    }

    // Heading and Comment separators carry the page number, so they belong
    // above the first fragment too; the rest only go between fragments.
    let leading_separator = matches!(
        config.separator,
        PageSeparator::Heading | PageSeparator::Comment
    );

    for (i, page) in pages.iter().enumerate() {
        if i > 0 || leading_separator {
            doc.push_str(&config.separator.render(page.page_num));
        } else if !doc.is_empty() {
            doc.push_str("\n\n");
        }

        match &page.error {
            None => doc.push_str(page.markdown.trim_end()),
            Some(e) => {
                doc.push_str(&format!("<!-- page {} failed: {} -->", page.page_num, e));
            }
        }

        for img in embedded.iter().filter(|img| img.page_num == page.page_num) {
            doc.push_str(&format!(
                "\n\n![Image {} on page {}]({}/{})",
                img.index, img.page_num, config.image_subdir, img.filename
            ));
        }
    }

    let trimmed = doc.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

fn render_header(metadata: &DocumentMetadata, source_name: &str, pages: &[PageResult]) -> String {
    let title = metadata
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| stem_of(source_name));

    let mut header = format!("# {}\n\n", title);
    header.push_str(&format!("> Source: {}\n", source_name));
    if let Some(ref author) = metadata.author {
        header.push_str(&format!("> Author: {}\n", author));
    }
    header.push_str(&format!(
        "> Pages: {} of {}\n",
        pages.len(),
        metadata.page_count
    ));
    header.push_str(&format!(
        "> Converted by pagemark v{}\n",
        env!("CARGO_PKG_VERSION")
    ));
    header.push_str("\n---\n");
    header
}

fn stem_of(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_name.to_string())
}

/// Write the assembled Markdown atomically (temp file + rename) so an
/// interrupted run never leaves a truncated output file.
pub async fn write_markdown_atomic(path: &Path, content: &str) -> Result<(), PagemarkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PagemarkError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(|e| PagemarkError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PagemarkError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, md: &str) -> PageResult {
        PageResult {
            page_num: n,
            markdown: md.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        }
    }

    fn failed(n: usize) -> PageResult {
        PageResult {
            page_num: n,
            markdown: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 3,
            error: Some(crate::error::PageError::Timeout { page: n, secs: 60 }),
        }
    }

    fn meta(pages: usize) -> DocumentMetadata {
        DocumentMetadata {
            page_count: pages,
            ..Default::default()
        }
    }

    #[test]
    fn heading_separator_numbers_every_page() {
        let config = OcrConfig::builder().include_header(false).build().unwrap();
        let pages = vec![page(1, "first"), page(2, "second")];
        let doc = assemble_document(&pages, &meta(2), &config, "doc.pdf", &[]);
        assert!(doc.contains("## Page 1"));
        assert!(doc.contains("## Page 2"));
        assert!(doc.ends_with("second\n"));
    }

    #[test]
    fn hr_separator_only_between_pages() {
        let config = OcrConfig::builder()
            .include_header(false)
            .separator(PageSeparator::HorizontalRule)
            .build()
            .unwrap();
        let pages = vec![page(1, "first"), page(2, "second")];
        let doc = assemble_document(&pages, &meta(2), &config, "doc.pdf", &[]);
        assert_eq!(doc, "first\n\n---\n\nsecond\n");
    }

    #[test]
    fn header_uses_pdf_title_when_present() {
        let config = OcrConfig::default();
        let mut m = meta(1);
        m.title = Some("Attention Is All You Need".into());
        let doc = assemble_document(&[page(1, "body")], &m, &config, "attention.pdf", &[]);
        assert!(doc.starts_with("# Attention Is All You Need\n"));
        assert!(doc.contains("> Source: attention.pdf"));
    }

    #[test]
    fn header_falls_back_to_file_stem() {
        let config = OcrConfig::default();
        let doc = assemble_document(&[page(1, "body")], &meta(1), &config, "report_q3.pdf", &[]);
        assert!(doc.starts_with("# report_q3\n"));
    }

    #[test]
    fn failed_page_becomes_comment_marker() {
        let config = OcrConfig::builder().include_header(false).build().unwrap();
        let pages = vec![page(1, "ok"), failed(2), page(3, "also ok")];
        let doc = assemble_document(&pages, &meta(3), &config, "doc.pdf", &[]);
        assert!(doc.contains("<!-- page 2 failed:"));
        assert!(doc.contains("also ok"));
    }

    #[test]
    fn embedded_images_are_linked_after_their_page() {
        let config = OcrConfig::builder().include_header(false).build().unwrap();
        let embedded = vec![ExtractedImage {
            page_num: 1,
            index: 1,
            filename: "page_1_img_1.png".into(),
            width: 100,
            height: 80,
        }];
        let doc = assemble_document(
            &[page(1, "text"), page(2, "more")],
            &meta(2),
            &config,
            "doc.pdf",
            &embedded,
        );
        let link_pos = doc.find("![Image 1 on page 1](images/page_1_img_1.png)").unwrap();
        let page2_pos = doc.find("## Page 2").unwrap();
        assert!(link_pos < page2_pos, "image link must sit inside page 1");
    }

    #[test]
    fn offload_writes_file_and_rewrites_link() {
        let dir = tempfile::tempdir().unwrap();
        // 1x1 transparent PNG
        let png_b64 = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        let markdown = format!("before ![figure](data:image/png;base64,{}) after", png_b64);

        let (rewritten, saved) =
            offload_data_url_images(&markdown, 3, 1, dir.path(), "images");

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename, "page_3_img_1.png");
        assert!(rewritten.contains("![figure](images/page_3_img_1.png)"));
        assert!(!rewritten.contains("base64"));
        assert!(dir.path().join("page_3_img_1.png").exists());
    }

    #[test]
    fn offload_continues_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let b64 = STANDARD.encode(b"fakeimagebytes");
        let markdown = format!("![a](data:image/jpeg;base64,{})", b64);

        let (_, saved) = offload_data_url_images(&markdown, 2, 4, dir.path(), "images");
        assert_eq!(saved[0].filename, "page_2_img_4.jpeg");
    }

    #[test]
    fn offload_leaves_undecodable_image_inline() {
        let dir = tempfile::tempdir().unwrap();
        let markdown = "![x](data:image/png;base64,%%%not-base64%%%)";
        let (rewritten, saved) = offload_data_url_images(markdown, 1, 1, dir.path(), "images");
        // The regex only matches valid base64 alphabets, so nothing changes.
        assert_eq!(rewritten, markdown);
        assert!(saved.is_empty());
    }

    #[test]
    fn offload_ignores_normal_links() {
        let dir = tempfile::tempdir().unwrap();
        let markdown = "![logo](https://example.com/logo.png)";
        let (rewritten, saved) = offload_data_url_images(markdown, 1, 1, dir.path(), "images");
        assert_eq!(rewritten, markdown);
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.md");
        write_markdown_atomic(&path, "# hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
