//! MCP server: expose the conversion as a single remote-callable tool.
//!
//! The server is stateless — each `pdf_to_markdown` call runs the full
//! pipeline and writes its output to disk, returning a JSON summary. The API
//! key comes from the environment (the MCP client's `env` block), never from
//! tool arguments, so transcripts don't leak credentials.

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, InitializeResult,
    ListToolsResult, PaginatedRequestParams, ServerCapabilities, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{parse_page_spec, OcrConfig};
use crate::convert::convert_to_file;
use crate::prompts::OcrMode;

/// Parameters for the `pdf_to_markdown` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PdfToMarkdownParams {
    /// Absolute path to the PDF file.
    pub pdf_path: String,
    /// Output Markdown path; defaults to the PDF path with a `.md` extension.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Page spec: "all", "5", "3-15", or "1,3,5-7".
    #[serde(default)]
    pub pages: Option<String>,
    /// Rendering DPI (72–600).
    #[serde(default)]
    pub dpi: Option<u32>,
    /// Extract embedded and data-URL images next to the output file.
    #[serde(default)]
    pub extract_images: Option<bool>,
    /// Per-request OCR timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Prompt template: document, academic, table, formula, or mixed.
    #[serde(default)]
    pub ocr_mode: Option<String>,
    /// Extra instructions appended to the prompt template.
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// Enhance page images before OCR.
    #[serde(default)]
    pub enhance_images: Option<bool>,
}

/// Result payload for the `pdf_to_markdown` tool.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PdfToMarkdownResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_extracted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PdfToMarkdownResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            page_count: None,
            failed_pages: None,
            images_extracted: None,
            error: Some(error.into()),
        }
    }
}

/// Build the conversion config from tool parameters.
///
/// MCP callers tend to be agents converting documents they cannot eyeball
/// first, so the DPI default is 300 here (vs. 200 on the CLI) to favour
/// recognition quality over speed.
fn build_config(params: &PdfToMarkdownParams) -> Result<OcrConfig, String> {
    let mut builder = OcrConfig::builder()
        .dpi(params.dpi.unwrap_or(300))
        .timeout_secs(params.timeout.unwrap_or(60))
        .extract_images(params.extract_images.unwrap_or(true))
        .enhance_images(params.enhance_images.unwrap_or(true));

    if let Some(ref spec) = params.pages {
        let selection = parse_page_spec(spec).map_err(|e| e.to_string())?;
        builder = builder.pages(selection);
    }

    if let Some(ref mode) = params.ocr_mode {
        let mode: OcrMode = mode.parse()?;
        builder = builder.mode(mode);
    }

    if let Some(ref extra) = params.custom_prompt {
        builder = builder.custom_prompt(extra.clone());
    }

    builder.build().map_err(|e| e.to_string())
}

/// Execute the `pdf_to_markdown` tool.
pub async fn pdf_to_markdown(params: PdfToMarkdownParams) -> PdfToMarkdownResult {
    let pdf_path = PathBuf::from(&params.pdf_path);
    if !pdf_path.exists() {
        return PdfToMarkdownResult::failure(format!("PDF file not found: {}", params.pdf_path));
    }

    let config = match build_config(&params) {
        Ok(c) => c,
        Err(e) => return PdfToMarkdownResult::failure(format!("Invalid parameters: {e}")),
    };

    let output_path = params
        .output_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| pdf_path.with_extension("md"));

    info!(
        "pdf_to_markdown: {} → {}",
        pdf_path.display(),
        output_path.display()
    );

    match convert_to_file(&params.pdf_path, &output_path, &config).await {
        Ok(stats) => PdfToMarkdownResult {
            success: true,
            output_path: Some(output_path.display().to_string()),
            page_count: Some(stats.processed_pages),
            failed_pages: Some(stats.failed_pages),
            images_extracted: Some(stats.images_extracted),
            error: None,
        },
        Err(e) => {
            error!("pdf_to_markdown failed: {e}");
            PdfToMarkdownResult::failure(e.to_string())
        }
    }
}

/// Pagemark MCP server.
///
/// Exposes PDF-to-Markdown OCR conversion over the Model Context Protocol.
pub struct PagemarkServer;

impl PagemarkServer {
    pub fn new() -> Self {
        Self
    }

    fn make_tool(name: &str, description: &str, schema: Value) -> Tool {
        Tool {
            name: Cow::Owned(name.to_string()),
            title: None,
            description: Some(Cow::Owned(description.to_string())),
            input_schema: Arc::new(serde_json::from_value(schema).unwrap_or_default()),
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }
}

impl Default for PagemarkServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHandler for PagemarkServer {
    fn get_info(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: Default::default(),
            server_info: Implementation {
                name: "pagemark-mcp".to_string(),
                title: Some("Pagemark PDF OCR Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Converts PDF documents to Markdown by rendering each page and \
                 running it through a hosted vision-language OCR model. \
                 Call pdf_to_markdown with an absolute PDF path; the Markdown \
                 file (and an images/ subdirectory when extract_images is on) \
                 is written next to the PDF unless output_path says otherwise. \
                 Requires DASHSCOPE_API_KEY in the server environment."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            let tools = vec![Self::make_tool(
                "pdf_to_markdown",
                "Convert a PDF file to Markdown using vision-language OCR. \
                 Returns JSON with the output path, processed page count, and \
                 the number of extracted images.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "pdf_path": {
                            "type": "string",
                            "description": "Absolute path to the PDF file"
                        },
                        "output_path": {
                            "type": "string",
                            "description": "Output Markdown path (default: PDF path with .md extension)"
                        },
                        "pages": {
                            "type": "string",
                            "description": "Page spec: 'all', '5', '3-15', or '1,3,5-7' (default: all)"
                        },
                        "dpi": {
                            "type": "integer",
                            "minimum": 72,
                            "maximum": 600,
                            "default": 300,
                            "description": "Rendering DPI"
                        },
                        "extract_images": {
                            "type": "boolean",
                            "default": true,
                            "description": "Extract embedded and data-URL images to an images/ subdirectory"
                        },
                        "timeout": {
                            "type": "integer",
                            "default": 60,
                            "description": "Per-request OCR timeout in seconds"
                        },
                        "ocr_mode": {
                            "type": "string",
                            "enum": ["document", "academic", "table", "formula", "mixed"],
                            "default": "academic",
                            "description": "Prompt template tuned to the document class"
                        },
                        "custom_prompt": {
                            "type": "string",
                            "description": "Extra instructions appended to the prompt template"
                        },
                        "enhance_images": {
                            "type": "boolean",
                            "default": true,
                            "description": "Enhance page images (contrast + sharpen) before OCR"
                        }
                    },
                    "required": ["pdf_path"]
                }),
            )];

            Ok(ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let name = request.name.clone();
        let args = request.arguments.clone().unwrap_or_default();

        async move {
            match name.as_ref() {
                "pdf_to_markdown" => {
                    let params: PdfToMarkdownParams =
                        serde_json::from_value(Value::Object(args))
                            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                    let result = pdf_to_markdown(params).await;
                    let json = serde_json::to_string(&result)
                        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                    if result.success {
                        Ok(CallToolResult::success(vec![Content::text(json)]))
                    } else {
                        Ok(CallToolResult::error(vec![Content::text(json)]))
                    }
                }
                _ => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", name),
                    None,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_with_defaults() {
        let json = r#"{"pdf_path": "/tmp/doc.pdf"}"#;
        let params: PdfToMarkdownParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.pdf_path, "/tmp/doc.pdf");
        assert!(params.output_path.is_none());
        assert!(params.dpi.is_none());
    }

    #[test]
    fn params_deserialize_full() {
        let json = r#"{
            "pdf_path": "/tmp/doc.pdf",
            "output_path": "/tmp/out.md",
            "pages": "1-5",
            "dpi": 240,
            "extract_images": false,
            "ocr_mode": "table"
        }"#;
        let params: PdfToMarkdownParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.dpi, Some(240));
        assert_eq!(params.extract_images, Some(false));
        assert_eq!(params.ocr_mode.as_deref(), Some("table"));
    }

    #[test]
    fn build_config_applies_mcp_defaults() {
        let params: PdfToMarkdownParams =
            serde_json::from_str(r#"{"pdf_path": "/tmp/doc.pdf"}"#).unwrap();
        let config = build_config(&params).unwrap();
        assert_eq!(config.dpi, 300);
        assert!(config.extract_images);
        assert_eq!(config.mode, OcrMode::Academic);
    }

    #[test]
    fn build_config_rejects_bad_mode() {
        let params: PdfToMarkdownParams =
            serde_json::from_str(r#"{"pdf_path": "x.pdf", "ocr_mode": "scan"}"#).unwrap();
        assert!(build_config(&params).is_err());
    }

    #[test]
    fn build_config_rejects_bad_pages() {
        let params: PdfToMarkdownParams =
            serde_json::from_str(r#"{"pdf_path": "x.pdf", "pages": "9-2"}"#).unwrap();
        assert!(build_config(&params).is_err());
    }

    #[tokio::test]
    async fn tool_reports_missing_pdf() {
        let params: PdfToMarkdownParams =
            serde_json::from_str(r#"{"pdf_path": "/no/such/file.pdf"}"#).unwrap();
        let result = pdf_to_markdown(params).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }
}
