//! Configuration types for PDF-to-Markdown OCR conversion.
//!
//! All conversion behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share the config between the CLI and the MCP server and to log exactly what
//! a run was configured with.

use crate::error::PagemarkError;
use crate::progress::ProgressSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default endpoint: DashScope's OpenAI-compatible gateway.
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Default vision model used for OCR.
pub const DEFAULT_MODEL: &str = "qwen3-vl-flash";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["DASHSCOPE_API_KEY", "PAGEMARK_API_KEY"];

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`OcrConfig::builder()`] or [`OcrConfig::default()`].
///
/// # Example
/// ```rust
/// use pagemark::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .dpi(300)
///     .timeout_secs(90)
///     .api_key("sk-...")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// OCR API key. When `None`, resolved from the environment
    /// (`DASHSCOPE_API_KEY`, then `PAGEMARK_API_KEY`) at call time.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat endpoint.
    pub base_url: String,

    /// Vision model identifier.
    pub model: String,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 200.
    ///
    /// 200 DPI keeps small print legible to the vision model while the PNG
    /// stays comfortably under typical request-size limits. Go to 300 for
    /// dense scans; 150 is usually enough for slide decks.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4096.
    ///
    /// A safety cap independent of DPI: a 300-DPI render of an A0 poster would
    /// otherwise allocate a multi-gigabyte bitmap. Either dimension is capped,
    /// scaling the other proportionally.
    pub max_rendered_pixels: u32,

    /// Per-OCR-request timeout in seconds. Range: 1–600. Default: 60.
    pub timeout_secs: u64,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Zero keeps the model deterministic and faithful to the page, which is
    /// what transcription wants. Raising it only invites hallucination.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: u32,

    /// Maximum retry attempts per page on a transient OCR failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Ask the API for high-resolution image handling
    /// (`vl_high_resolution_images`). Default: true.
    pub high_resolution: bool,

    /// Prompt template selection. Default: [`crate::prompts::OcrMode::Academic`].
    pub mode: crate::prompts::OcrMode,

    /// Extra instructions appended to the selected prompt template.
    pub custom_prompt: Option<String>,

    /// Enhance page images (contrast + unsharp mask) before OCR. Default: true.
    pub enhance_images: bool,

    /// Extract embedded PDF images and offload data-URL images emitted by the
    /// model to the image subdirectory. Default: true.
    ///
    /// Only applies to [`crate::convert::convert_to_file`]; the in-memory API
    /// has no directory to write into.
    pub extract_images: bool,

    /// Name of the image subdirectory next to the output file. Default: "images".
    pub image_subdir: String,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Separator inserted between page fragments. Default: per-page headings.
    pub separator: PageSeparator,

    /// Prepend a blockquote header with source file, page count and generator.
    /// Default: true.
    pub include_header: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional sink for per-page progress events.
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dpi: 200,
            max_rendered_pixels: 4096,
            timeout_secs: 60,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 1000,
            high_resolution: true,
            mode: crate::prompts::OcrMode::Academic,
            custom_prompt: None,
            enhance_images: true,
            extract_images: true,
            image_subdir: "images".to_string(),
            pages: PageSelection::default(),
            separator: PageSeparator::default(),
            include_header: true,
            password: None,
            download_timeout_secs: 120,
            progress: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("high_resolution", &self.high_resolution)
            .field("mode", &self.mode)
            .field("enhance_images", &self.enhance_images)
            .field("extract_images", &self.extract_images)
            .field("pages", &self.pages)
            .field("separator", &self.separator)
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key: explicit config value first, then the environment.
    ///
    /// The "your_api_key_here" placeholder that ships in sample `.env` files
    /// is treated as unset.
    pub fn resolve_api_key(&self) -> Result<String, PagemarkError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() && key != "your_api_key_here" {
                return Ok(key.clone());
            }
        }
        for var in API_KEY_ENV_VARS {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() && key != "your_api_key_here" {
                    return Ok(key);
                }
            }
        }
        Err(PagemarkError::MissingApiKey)
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn high_resolution(mut self, v: bool) -> Self {
        self.config.high_resolution = v;
        self
    }

    pub fn mode(mut self, mode: crate::prompts::OcrMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_prompt = Some(prompt.into());
        self
    }

    pub fn enhance_images(mut self, v: bool) -> Self {
        self.config.enhance_images = v;
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn image_subdir(mut self, name: impl Into<String>) -> Self {
        self.config.image_subdir = name.into();
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn separator(mut self, sep: PageSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn include_header(mut self, v: bool) -> Self {
        self.config.include_header = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.config.progress = Some(sink);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, PagemarkError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PagemarkError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.timeout_secs < 1 || c.timeout_secs > 600 {
            return Err(PagemarkError::InvalidConfig(format!(
                "Timeout must be 1–600 seconds, got {}",
                c.timeout_secs
            )));
        }
        if c.base_url.is_empty() {
            return Err(PagemarkError::InvalidConfig("Base URL is empty".into()));
        }
        if c.image_subdir.is_empty() || c.image_subdir.contains(['/', '\\']) {
            return Err(PagemarkError::InvalidConfig(format!(
                "Image subdirectory must be a plain directory name, got '{}'",
                c.image_subdir
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed
    /// page numbers, dropping anything outside the document.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Parse a user-facing page spec into a [`PageSelection`].
///
/// Accepted forms: `all`, a single page (`5`), an inclusive range (`3-15`),
/// or a comma list whose items may themselves be ranges (`1,3,5-7`).
/// Pages are 1-indexed.
pub fn parse_page_spec(spec: &str) -> Result<PageSelection, PagemarkError> {
    let spec = spec.trim().to_ascii_lowercase();
    if spec.is_empty() || spec == "all" {
        return Ok(PageSelection::All);
    }

    let parse_num = |s: &str| -> Result<usize, PagemarkError> {
        let n: usize = s.trim().parse().map_err(|_| {
            PagemarkError::InvalidConfig(format!("invalid page number '{}'", s.trim()))
        })?;
        if n == 0 {
            return Err(PagemarkError::InvalidConfig(
                "pages are 1-indexed, minimum is 1".into(),
            ));
        }
        Ok(n)
    };

    let parse_part = |part: &str| -> Result<Vec<usize>, PagemarkError> {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_num(start)?;
                let end = parse_num(end)?;
                if start > end {
                    return Err(PagemarkError::InvalidConfig(format!(
                        "invalid page range '{}-{}': start must be <= end",
                        start, end
                    )));
                }
                Ok((start..=end).collect())
            }
            None => Ok(vec![parse_num(part)?]),
        }
    };

    if spec.contains(',') {
        let mut pages = Vec::new();
        for part in spec.split(',') {
            pages.extend(parse_part(part)?);
        }
        return Ok(PageSelection::Set(pages));
    }

    if let Some((start, end)) = spec.split_once('-') {
        let start = parse_num(start)?;
        let end = parse_num(end)?;
        if start > end {
            return Err(PagemarkError::InvalidConfig(format!(
                "invalid page range '{}-{}': start must be <= end",
                start, end
            )));
        }
        return Ok(PageSelection::Range(start, end));
    }

    Ok(PageSelection::Single(parse_num(&spec)?))
}

/// How to separate page fragments in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// A `## Page N` heading above each fragment. (default)
    #[default]
    Heading,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// No separator; fragments joined with "\n\n".
    None,
    /// Custom string inserted between fragments.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator text preceding the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::Heading => format!("\n\n## Page {}\n\n", page_num),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        assert!(OcrConfig::builder().dpi(50).build().is_err());
        assert!(OcrConfig::builder().dpi(601).build().is_err());
        assert!(OcrConfig::builder().dpi(300).build().is_ok());
    }

    #[test]
    fn builder_rejects_bad_timeout() {
        assert!(OcrConfig::builder().timeout_secs(0).build().is_err());
        assert!(OcrConfig::builder().timeout_secs(601).build().is_err());
    }

    #[test]
    fn builder_rejects_nested_image_subdir() {
        assert!(OcrConfig::builder()
            .image_subdir("a/b")
            .build()
            .is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = OcrConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn resolve_api_key_prefers_explicit_value() {
        let c = OcrConfig::builder().api_key("sk-test").build().unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn resolve_api_key_rejects_placeholder() {
        let c = OcrConfig::builder()
            .api_key("your_api_key_here")
            .build()
            .unwrap();
        // Placeholder falls through to the environment; with neither env var
        // set this is MissingApiKey. Guard against CI having a real key.
        if API_KEY_ENV_VARS.iter().all(|v| std::env::var(v).is_err()) {
            assert!(matches!(
                c.resolve_api_key(),
                Err(PagemarkError::MissingApiKey)
            ));
        }
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(2, 99).to_indices(5), vec![1, 2, 3, 4]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 9]).to_indices(5),
            vec![0, 2]
        );
    }

    #[test]
    fn page_spec_all_and_single() {
        assert_eq!(parse_page_spec("all").unwrap(), PageSelection::All);
        assert_eq!(parse_page_spec("  ALL ").unwrap(), PageSelection::All);
        assert_eq!(parse_page_spec("5").unwrap(), PageSelection::Single(5));
    }

    #[test]
    fn page_spec_range() {
        assert_eq!(parse_page_spec("3-15").unwrap(), PageSelection::Range(3, 15));
        assert!(parse_page_spec("9-3").is_err());
        assert!(parse_page_spec("0-3").is_err());
    }

    #[test]
    fn page_spec_comma_list_with_ranges() {
        assert_eq!(
            parse_page_spec("1,3,5-7").unwrap(),
            PageSelection::Set(vec![1, 3, 5, 6, 7])
        );
    }

    #[test]
    fn page_spec_rejects_garbage() {
        assert!(parse_page_spec("abc").is_err());
        assert!(parse_page_spec("1,x").is_err());
        assert!(parse_page_spec("0").is_err());
    }

    #[test]
    fn separator_rendering() {
        assert_eq!(PageSeparator::Heading.render(4), "\n\n## Page 4\n\n");
        assert_eq!(PageSeparator::HorizontalRule.render(1), "\n\n---\n\n");
        assert_eq!(PageSeparator::Comment.render(2), "\n\n<!-- page 2 -->\n\n");
        assert_eq!(PageSeparator::None.render(7), "\n\n");
        assert_eq!(
            PageSeparator::Custom("* * *".into()).render(3),
            "\n\n* * *\n\n"
        );
    }
}
