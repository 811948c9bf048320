//! OCR client: drive the hosted vision-language chat endpoint.
//!
//! The endpoint speaks the OpenAI-compatible `chat/completions` wire format;
//! each page becomes a single user message holding the page image as a data
//! URL plus the mode prompt. All prompt text lives in [`crate::prompts`] so
//! it can change without touching the retry or error-classification logic
//! here.
//!
//! ## Retry strategy
//!
//! 429 and 5xx responses and transport timeouts are transient. Exponential
//! backoff (`retry_backoff_ms * 2^attempt`) spaces the attempts; a 429 with a
//! `Retry-After` header uses the server's delay instead. Authentication
//! failures (401/403) are fatal for the whole run — every subsequent page
//! would fail the same way — and other 4xx responses fail the page without
//! retrying.

use crate::config::OcrConfig;
use crate::error::{PageError, PagemarkError};
use crate::output::PageResult;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    /// DashScope extension: request full-resolution image handling.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    vl_high_resolution_images: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Content<'a> {
    Image {
        r#type: &'a str,
        image_url: ImageUrl<'a>,
    },
    Text {
        r#type: &'a str,
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Error body shape shared by OpenAI-compatible gateways.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

// ── Internal call outcome ────────────────────────────────────────────────

struct PageText {
    markdown: String,
    input_tokens: u32,
    output_tokens: u32,
}

enum CallError {
    /// Worth another attempt (429, 5xx, network, empty content).
    Transient {
        detail: String,
        retry_after: Option<u64>,
    },
    /// Request timed out.
    Timeout,
    /// This page will never succeed (unexpected 4xx).
    Permanent { detail: String },
    /// The whole run should stop (401/403).
    Fatal(PagemarkError),
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for the vision-OCR endpoint.
///
/// Cheap to construct; holds the resolved API key so a missing key fails
/// before any page is rendered.
pub struct OcrClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OcrClient {
    /// Build a client from the config, resolving the API key eagerly.
    pub fn new(config: &OcrConfig) -> Result<Self, PagemarkError> {
        let api_key = config.resolve_api_key()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PagemarkError::Internal(format!("HTTP client: {e}")))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    /// Run OCR on a single rendered page.
    ///
    /// Always returns `Ok(PageResult)` for per-page failures — the error is
    /// stored in `result.error` so the document run continues. Only
    /// authentication failures propagate as `Err`, because they doom every
    /// remaining page.
    pub async fn recognize_page(
        &self,
        page_num: usize,
        image_data_url: &str,
        prompt: &str,
        config: &OcrConfig,
    ) -> Result<PageResult, PagemarkError> {
        let start = Instant::now();
        let mut last_err = String::from("no attempt made");
        let mut server_delay: Option<u64> = None;

        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                // A Retry-After from the server overrides our own backoff.
                let wait_ms = match server_delay.take() {
                    Some(secs) => secs * 1000,
                    None => config.retry_backoff_ms * 2u64.pow(attempt - 1),
                };
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, config.max_retries, wait_ms
                );
                sleep(Duration::from_millis(wait_ms)).await;
            }

            match self.call_once(image_data_url, prompt, config).await {
                Ok(text) => {
                    let duration = start.elapsed();
                    debug!(
                        "Page {}: {} chars, {} in / {} out tokens, {:?}",
                        page_num,
                        text.markdown.len(),
                        text.input_tokens,
                        text.output_tokens,
                        duration
                    );
                    return Ok(PageResult {
                        page_num,
                        markdown: text.markdown,
                        input_tokens: text.input_tokens,
                        output_tokens: text.output_tokens,
                        duration_ms: duration.as_millis() as u64,
                        retries: attempt,
                        error: None,
                    });
                }
                Err(CallError::Fatal(e)) => return Err(e),
                Err(CallError::Permanent { detail }) => {
                    warn!("Page {}: permanent API error — {}", page_num, detail);
                    return Ok(failed_page(
                        page_num,
                        start,
                        attempt,
                        PageError::OcrFailed {
                            page: page_num,
                            retries: attempt,
                            detail,
                        },
                    ));
                }
                Err(CallError::Timeout) => {
                    warn!("Page {}: attempt {} timed out", page_num, attempt + 1);
                    last_err = format!("request timed out after {}s", config.timeout_secs);
                }
                Err(CallError::Transient {
                    detail,
                    retry_after,
                }) => {
                    warn!(
                        "Page {}: attempt {} failed — {}",
                        page_num,
                        attempt + 1,
                        detail
                    );
                    last_err = detail;
                    server_delay = retry_after;
                }
            }
        }

        let error = if last_err.contains("timed out") {
            PageError::Timeout {
                page: page_num,
                secs: config.timeout_secs,
            }
        } else {
            PageError::OcrFailed {
                page: page_num,
                retries: config.max_retries,
                detail: last_err,
            }
        };
        Ok(failed_page(page_num, start, config.max_retries, error))
    }

    async fn call_once(
        &self,
        image_data_url: &str,
        prompt: &str,
        config: &OcrConfig,
    ) -> Result<PageText, CallError> {
        let request = ChatRequest {
            model: &config.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    Content::Image {
                        r#type: "image_url",
                        image_url: ImageUrl {
                            url: image_data_url,
                        },
                    },
                    Content::Text {
                        r#type: "text",
                        text: prompt,
                    },
                ],
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            vl_high_resolution_images: config.high_resolution,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Timeout
                } else {
                    CallError::Transient {
                        detail: format!("network error: {e}"),
                        retry_after: None,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let detail = extract_error_message(&response.text().await.unwrap_or_default());

            return Err(match status.as_u16() {
                401 | 403 => CallError::Fatal(PagemarkError::AuthFailed {
                    status: status.as_u16(),
                    detail,
                }),
                429 => CallError::Transient {
                    detail: format!("rate limited: {detail}"),
                    retry_after,
                },
                500..=599 | 408 => CallError::Transient {
                    detail: format!("HTTP {status}: {detail}"),
                    retry_after: None,
                },
                _ => CallError::Permanent {
                    detail: format!("HTTP {status}: {detail}"),
                },
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| CallError::Transient {
            detail: format!("malformed response: {e}"),
            retry_after: None,
        })?;

        let markdown = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if markdown.trim().is_empty() {
            return Err(CallError::Transient {
                detail: "API returned empty content".into(),
                retry_after: None,
            });
        }

        let usage = body.usage.unwrap_or_default();
        Ok(PageText {
            markdown,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

fn failed_page(page_num: usize, start: Instant, retries: u32, error: PageError) -> PageResult {
    PageResult {
        page_num,
        markdown: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        error: Some(error),
    }
}

/// Pull a human-readable message out of an error body, which may be the
/// OpenAI-style `{"error":{"message":…}}`, a flat `{"message":…}`, or plain
/// text.
fn extract_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(msg) = parsed.error.and_then(|e| e.message) {
            return msg;
        }
        if let Some(msg) = parsed.message {
            return msg;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error detail".to_string()
    } else if trimmed.len() > 200 {
        let mut end = 200;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_image_then_text() {
        let req = ChatRequest {
            model: "qwen3-vl-flash",
            messages: vec![Message {
                role: "user",
                content: vec![
                    Content::Image {
                        r#type: "image_url",
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AAAA",
                        },
                    },
                    Content::Text {
                        r#type: "text",
                        text: "qwenvl markdown",
                    },
                ],
            }],
            temperature: 0.0,
            max_tokens: 4096,
            vl_high_resolution_images: true,
        };
        let json = serde_json::to_string(&req).unwrap();
        let image_pos = json.find("image_url").unwrap();
        let text_pos = json.find("qwenvl markdown").unwrap();
        assert!(image_pos < text_pos, "image must precede the prompt text");
        assert!(json.contains("\"vl_high_resolution_images\":true"));
    }

    #[test]
    fn high_resolution_flag_is_omitted_when_false() {
        let req = ChatRequest {
            model: "qwen3-vl-flash",
            messages: vec![],
            temperature: 0.0,
            max_tokens: 64,
            vl_high_resolution_images: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("vl_high_resolution_images"));
    }

    #[test]
    fn response_parses_content_and_usage() {
        let json = r##"{
            "choices": [{"message": {"content": "# Title\n\nBody"}}],
            "usage": {"prompt_tokens": 1500, "completion_tokens": 320}
        }"##;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.choices[0].message.content.as_deref(),
            Some("# Title\n\nBody")
        );
        assert_eq!(resp.usage.unwrap().prompt_tokens, 1500);
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(
            extract_error_message(r#"{"message":"quota exceeded"}"#),
            "quota exceeded"
        );
        assert_eq!(extract_error_message("plain text error"), "plain text error");
        assert_eq!(extract_error_message(""), "no error detail");
    }

    #[test]
    fn client_requires_api_key() {
        let config = OcrConfig::default();
        if crate::config::API_KEY_ENV_VARS
            .iter()
            .all(|v| std::env::var(v).is_err())
        {
            assert!(matches!(
                OcrClient::new(&config),
                Err(PagemarkError::MissingApiKey)
            ));
        }
    }

    #[test]
    fn client_builds_endpoint_without_double_slash() {
        let config = OcrConfig::builder()
            .api_key("sk-test")
            .base_url("https://example.com/v1/")
            .build()
            .unwrap();
        let client = OcrClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://example.com/v1/chat/completions");
    }
}
