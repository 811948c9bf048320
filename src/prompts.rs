//! Prompt templates for the vision-OCR request.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how a document class is handled
//!    (e.g. tightening table handling) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live API, making prompt regressions easy to catch.
//!
//! Each [`OcrMode`] selects one template; callers can append extra
//! instructions via [`crate::config::OcrConfig::custom_prompt`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trigger phrase the qwen-vl model family recognises as "emit Markdown".
///
/// Every template embeds it so the model stays in its structured-output mode
/// regardless of which document class the surrounding instructions target.
pub const BASE_MARKDOWN_TRIGGER: &str = "qwenvl markdown";

/// Document class the OCR prompt is tuned for.
///
/// Five modes exist because prompt emphasis trades off: a template that
/// lingers on matrix notation wastes attention on an invoice, and a
/// table-first template under-serves running prose. Pick the mode matching
/// the dominant content; `Mixed` hedges when you don't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// General documents: reports, letters, manuals.
    Document,
    /// Academic papers: formulas, citations, figure captions. (default)
    #[default]
    Academic,
    /// Table-dense pages: forms, financial statements.
    Table,
    /// Formula-dense pages: textbooks, derivations.
    Formula,
    /// Unknown or varied content; balanced instructions.
    Mixed,
}

impl OcrMode {
    /// All mode names, for CLI help text.
    pub const NAMES: [&'static str; 5] = ["document", "academic", "table", "formula", "mixed"];
}

impl FromStr for OcrMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(OcrMode::Document),
            "academic" => Ok(OcrMode::Academic),
            "table" => Ok(OcrMode::Table),
            "formula" => Ok(OcrMode::Formula),
            "mixed" => Ok(OcrMode::Mixed),
            other => Err(format!(
                "unknown OCR mode '{other}'. Valid modes: {}",
                OcrMode::NAMES.join(", ")
            )),
        }
    }
}

impl std::fmt::Display for OcrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OcrMode::Document => "document",
            OcrMode::Academic => "academic",
            OcrMode::Table => "table",
            OcrMode::Formula => "formula",
            OcrMode::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

const ACADEMIC_PROMPT: &str = r#"Convert this academic document page to high-quality Markdown.

Requirements:
1. Recognise ALL text content, including footnotes, headers, and footers
2. Mathematical formulas use LaTeX: inline as $...$, display as $$...$$
3. Preserve reference numbering and citation formats
4. Keep figure and table captions with their numbering
5. Reproduce the section structure: headings, appendices, bibliography
6. Handle mixed-language content accurately
7. Preserve special symbols, super/subscripts, and Greek letters

{trigger}

Output format:
- Standard Markdown syntax only
- Tables as Markdown tables, code blocks fenced with a language tag
- Do not omit anything; transcribe uncertain text rather than dropping it"#;

const DOCUMENT_PROMPT: &str = r#"Convert this document page to Markdown.

Requirements:
1. Preserve the original structure: heading levels, paragraphs, lists
2. Recognise all text accurately, including mixed languages
3. Keep tables as Markdown tables
4. Mathematical notation in LaTeX ($...$ or $$...$$)
5. Mark images as ![description](path)
6. Do not drop any visible text

{trigger}"#;

const TABLE_PROMPT: &str = r#"Convert this table-heavy document page to Markdown.

Focus on:
1. Table structure: rows, columns, merged cells
2. Header rows identified correctly
3. Every cell's data, nothing skipped
4. Table numbers and captions
5. Notes below each table

{trigger}

For complex tables:
- Prefer Markdown table syntax
- Fall back to an HTML table when Markdown cannot express the layout
- Leave empty cells empty or use "-""#;

const FORMULA_PROMPT: &str = r#"Convert this formula-heavy document page to Markdown with LaTeX math.

Formula rules:
1. Inline math: $formula$
2. Display math: $$formula$$ on its own line
3. Matrices: \begin{matrix}...\end{matrix} or \begin{bmatrix}...\end{bmatrix}
4. Fractions: \frac{num}{den}
5. Superscripts/subscripts: ^ and _
6. Greek letters and operators as LaTeX commands (\alpha, \sum, \int, \partial, \infty)
7. Sizing brackets: \left( ... \right)

{trigger}

Prose between formulas uses standard Markdown."#;

const MIXED_PROMPT: &str = r#"Convert this document page to Markdown, handling all element types.

Rules:
1. Text: standard Markdown
2. Tables: Markdown tables, or HTML for complex layouts
3. Formulas: LaTeX ($...$ or $$...$$)
4. Images: ![description](path)
5. Code: fenced blocks with a language tag
6. Lists: keep ordered/unordered structure

{trigger}

Completeness over polish: do not drop any visible text."#;

/// Build the full prompt for the given mode, with an optional custom
/// instruction appended at the end.
pub fn build_prompt(mode: OcrMode, custom_instruction: Option<&str>) -> String {
    let template = match mode {
        OcrMode::Document => DOCUMENT_PROMPT,
        OcrMode::Academic => ACADEMIC_PROMPT,
        OcrMode::Table => TABLE_PROMPT,
        OcrMode::Formula => FORMULA_PROMPT,
        OcrMode::Mixed => MIXED_PROMPT,
    };

    let mut prompt = template.replace("{trigger}", BASE_MARKDOWN_TRIGGER);

    if let Some(extra) = custom_instruction {
        let extra = extra.trim();
        if !extra.is_empty() {
            prompt.push_str("\n\nAdditional requirements:\n");
            prompt.push_str(extra);
        }
    }

    prompt
}
