//! Pipeline stages for PDF-to-Markdown OCR conversion.
//!
//! Each submodule implements exactly one transformation step, which keeps
//! every stage independently testable and lets the rendering backend or the
//! OCR endpoint change without touching the others.
//!
//! ## Data flow
//!
//! ```text
//! input ──▶ render ──▶ preprocess ──▶ encode ──▶ ocr ──▶ postprocess ──▶ assemble
//! (URL/path) (pdfium)  (enhance)     (base64)   (HTTP)   (cleanup)       (document)
//!                └──▶ extract (embedded images) ─────────────────────────────┘
//! ```
//!
//! 1. [`input`]       — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]      — rasterise selected pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`preprocess`]  — optional contrast/sharpen enhancement of page images
//! 4. [`encode`]      — PNG-encode and base64-wrap each page for the request body
//! 5. [`ocr`]         — drive the vision API call with retry/backoff; the only
//!    stage with network I/O
//! 6. [`postprocess`] — deterministic cleanup of model quirks (stray fences,
//!    CRLF, invisible Unicode)
//! 7. [`extract`]     — pull embedded images out of the PDF's page objects
//! 8. [`assemble`]    — header, separators, data-URL offload, final document

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod render;
