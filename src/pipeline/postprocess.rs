//! Post-processing: deterministic cleanup of model-generated Markdown.
//!
//! Even well-prompted vision models occasionally wrap the whole page in
//! ` ```markdown ` fences, emit Windows line endings, or sprinkle invisible
//! Unicode. These passes fix the recurring quirks with cheap string rules,
//! keeping the prompt focused on *what to extract* rather than formatting
//! edge-cases. Each rule is a pure `&str → String` function and is
//! independently testable.
//!
//! Rule order matters: fences are stripped before whitespace rules so the
//! remaining passes see clean input, and the final-newline pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw OCR output for one page.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 4+ consecutive newlines down to 3
/// 5. Strip invisible Unicode (zero-width spaces, BOM, word joiners)
/// 6. Trim outer blank lines, ending without a trailing newline
///    (the assembler owns inter-page whitespace)
pub fn clean_page_markdown(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Strip invisible Unicode ──────────────────────────────────────

const INVISIBLE_CHARS: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}', '\u{2060}'];

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence_wrapper() {
        let input = "```markdown\n# Title\n\nBody text\n```";
        assert_eq!(clean_page_markdown(input), "# Title\n\nBody text");
    }

    #[test]
    fn strips_anonymous_fence_wrapper() {
        let input = "```\n# Title\n```";
        assert_eq!(clean_page_markdown(input), "# Title");
    }

    #[test]
    fn keeps_inner_code_fences() {
        let input = "# Title\n\n```rust\nfn main() {}\n```\n\nafter";
        let out = clean_page_markdown(input);
        assert!(out.contains("```rust"));
        assert!(out.ends_with("after"));
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(clean_page_markdown("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trims_trailing_spaces() {
        assert_eq!(clean_page_markdown("line one   \nline two\t"), "line one\nline two");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(clean_page_markdown("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn removes_invisible_unicode() {
        let input = "he\u{200B}llo\u{FEFF} world";
        assert_eq!(clean_page_markdown(input), "hello world");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_page_markdown("   \n\n  "), "");
    }
}
