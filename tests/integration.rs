//! Integration tests for pagemark.
//!
//! The bulk of these exercise the pure pipeline stages (page selection,
//! prompts, cleanup, assembly) and need neither a pdfium library nor network
//! access. The live end-to-end tests at the bottom hit the real OCR endpoint
//! and are gated behind the `E2E_ENABLED` environment variable:
//!
//!   E2E_ENABLED=1 DASHSCOPE_API_KEY=sk-... cargo test --test integration -- --nocapture

use pagemark::pipeline::{assemble, postprocess};
use pagemark::{
    parse_page_spec, DocumentMetadata, OcrConfig, OcrMode, PageError, PageResult, PageSelection,
    PageSeparator, PagemarkError,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn ok_page(n: usize, md: &str) -> PageResult {
    PageResult {
        page_num: n,
        markdown: md.to_string(),
        input_tokens: 1000,
        output_tokens: 250,
        duration_ms: 800,
        retries: 0,
        error: None,
    }
}

fn bad_page(n: usize) -> PageResult {
    PageResult {
        page_num: n,
        markdown: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 100,
        retries: 3,
        error: Some(PageError::OcrFailed {
            page: n,
            retries: 3,
            detail: "HTTP 503: upstream overloaded".into(),
        }),
    }
}

fn meta(pages: usize) -> DocumentMetadata {
    DocumentMetadata {
        page_count: pages,
        ..Default::default()
    }
}

// ── Page selection ───────────────────────────────────────────────────────────

#[test]
fn page_spec_round_trips_into_indices() {
    let sel = parse_page_spec("1,3,5-7").unwrap();
    assert_eq!(sel.to_indices(10), vec![0, 2, 4, 5, 6]);

    let sel = parse_page_spec("3-15").unwrap();
    assert_eq!(sel.to_indices(5), vec![2, 3, 4]);

    let sel = parse_page_spec("all").unwrap();
    assert_eq!(sel.to_indices(3), vec![0, 1, 2]);
}

#[test]
fn page_spec_duplicates_collapse() {
    let sel = parse_page_spec("2,2,1-3").unwrap();
    assert_eq!(sel.to_indices(5), vec![0, 1, 2]);
}

#[test]
fn out_of_range_selection_is_empty() {
    assert!(PageSelection::Single(10).to_indices(5).is_empty());
    assert!(PageSelection::Set(vec![8, 9]).to_indices(5).is_empty());
}

// ── Config validation ────────────────────────────────────────────────────────

#[test]
fn config_defaults_match_the_documented_values() {
    let c = OcrConfig::default();
    assert_eq!(c.dpi, 200);
    assert_eq!(c.model, "qwen3-vl-flash");
    assert_eq!(c.timeout_secs, 60);
    assert_eq!(c.max_retries, 3);
    assert_eq!(c.temperature, 0.0);
    assert!(c.high_resolution);
    assert!(c.extract_images);
    assert_eq!(c.image_subdir, "images");
    assert_eq!(c.mode, OcrMode::Academic);
}

#[test]
fn config_builder_enforces_bounds() {
    assert!(matches!(
        OcrConfig::builder().dpi(20).build(),
        Err(PagemarkError::InvalidConfig(_))
    ));
    assert!(matches!(
        OcrConfig::builder().timeout_secs(1000).build(),
        Err(PagemarkError::InvalidConfig(_))
    ));
}

// ── Postprocess ──────────────────────────────────────────────────────────────

#[test]
fn postprocess_strips_fence_and_crlf_together() {
    let raw = "```markdown\r\n# Heading\r\n\r\nParagraph.\r\n```";
    let cleaned = postprocess::clean_page_markdown(raw);
    assert_eq!(cleaned, "# Heading\n\nParagraph.");
}

#[test]
fn postprocess_is_idempotent() {
    let raw = "# Title\n\n\n\n\nbody   \n";
    let once = postprocess::clean_page_markdown(raw);
    let twice = postprocess::clean_page_markdown(&once);
    assert_eq!(once, twice);
}

// ── Assembly ─────────────────────────────────────────────────────────────────

#[test]
fn assembled_document_has_header_pages_and_final_newline() {
    let config = OcrConfig::default();
    let pages = vec![ok_page(1, "# Intro\n\nFirst."), ok_page(2, "Second.")];
    let doc = assemble::assemble_document(&pages, &meta(2), &config, "thesis.pdf", &[]);

    assert!(doc.starts_with("# thesis\n"));
    assert!(doc.contains("> Source: thesis.pdf"));
    assert!(doc.contains("> Pages: 2 of 2"));
    assert!(doc.contains("## Page 1"));
    assert!(doc.contains("## Page 2"));
    assert!(doc.ends_with("Second.\n"));
    assert!(!doc.contains("\n\n\n\n"));
}

#[test]
fn failed_page_keeps_its_slot() {
    let config = OcrConfig::builder().include_header(false).build().unwrap();
    let pages = vec![ok_page(1, "one"), bad_page(2), ok_page(3, "three")];
    let doc = assemble::assemble_document(&pages, &meta(3), &config, "doc.pdf", &[]);

    let p1 = doc.find("## Page 1").unwrap();
    let p2 = doc.find("## Page 2").unwrap();
    let p3 = doc.find("## Page 3").unwrap();
    assert!(p1 < p2 && p2 < p3);
    assert!(doc.contains("<!-- page 2 failed:"));
}

#[test]
fn comment_separator_marks_every_page() {
    let config = OcrConfig::builder()
        .include_header(false)
        .separator(PageSeparator::Comment)
        .build()
        .unwrap();
    let pages = vec![ok_page(4, "a"), ok_page(5, "b")];
    let doc = assemble::assemble_document(&pages, &meta(9), &config, "doc.pdf", &[]);
    assert!(doc.contains("<!-- page 4 -->"));
    assert!(doc.contains("<!-- page 5 -->"));
}

#[test]
fn custom_separator_appears_between_pages_only() {
    let config = OcrConfig::builder()
        .include_header(false)
        .separator(PageSeparator::Custom("<<<>>>".into()))
        .build()
        .unwrap();
    let pages = vec![ok_page(1, "a"), ok_page(2, "b"), ok_page(3, "c")];
    let doc = assemble::assemble_document(&pages, &meta(3), &config, "doc.pdf", &[]);
    assert_eq!(doc.matches("<<<>>>").count(), 2);
    assert!(doc.starts_with("a\n"));
}

#[test]
fn data_url_offload_feeds_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let png_b64 = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
    let raw = format!("Text before.\n\n![chart](data:image/png;base64,{png_b64})\n\nText after.");

    let (rewritten, saved) =
        assemble::offload_data_url_images(&raw, 1, 1, dir.path(), "images");
    assert_eq!(saved.len(), 1);

    let config = OcrConfig::builder().include_header(false).build().unwrap();
    let doc = assemble::assemble_document(
        &[ok_page(1, &rewritten)],
        &meta(1),
        &config,
        "doc.pdf",
        &[],
    );
    assert!(doc.contains("![chart](images/page_1_img_1.png)"));
    assert!(!doc.contains("base64"));
}

// ── Fatal error paths through the public API ─────────────────────────────────

#[tokio::test]
async fn convert_reports_missing_input() {
    let config = OcrConfig::builder().api_key("sk-test").build().unwrap();
    let err = pagemark::convert("/nope/missing.pdf", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PagemarkError::FileNotFound { .. }));
}

#[tokio::test]
async fn convert_rejects_non_pdf_input() {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(b"GIF89a not a pdf at all").unwrap();

    let config = OcrConfig::builder().api_key("sk-test").build().unwrap();
    let err = pagemark::convert(f.path().to_str().unwrap(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PagemarkError::NotAPdf { .. }));
}

// ── Live end-to-end (opt-in) ─────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test unless E2E_ENABLED is set *and* the PDF exists.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn e2e_inspect_sample() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let meta = pagemark::inspect(path.to_str().unwrap())
        .await
        .expect("inspect() should succeed");
    assert!(meta.page_count >= 1);
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn e2e_convert_sample_to_file() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("sample.md");

    let config = OcrConfig::builder()
        .pages(PageSelection::Range(1, 2))
        .build()
        .unwrap();

    let stats = pagemark::convert_to_file(path.to_str().unwrap(), &out, &config)
        .await
        .expect("conversion should succeed");

    assert!(stats.processed_pages >= 1);
    let md = std::fs::read_to_string(&out).unwrap();
    assert!(md.ends_with('\n'));
    assert!(md.contains("## Page 1"));
    println!(
        "e2e: {} pages, {} images, {} bytes markdown",
        stats.processed_pages,
        stats.images_extracted,
        md.len()
    );
}
