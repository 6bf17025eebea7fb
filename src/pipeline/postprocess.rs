//! Post-processing: deterministic cleanup of recognised text.
//!
//! Vision models occasionally wrap their answer in code fences or open with
//! a chatty lead-in despite the prompt; local OCR engines emit CRLF, form
//! feeds and trailing spaces. These rules fix such artefacts without touching
//! content, so the stitched text of a document looks the same whichever
//! backend produced each page.
//!
//! Rules run in order:
//! 1. Strip outer code fences
//! 2. Drop a conversational lead-in line ("Here is the transcribed text:")
//! 3. Normalise line endings (CRLF/CR → LF, form feed → blank line)
//! 4. Trim trailing whitespace per line
//! 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 6. Collapse 3+ consecutive blank lines down to 2
//! 7. Trim leading/trailing blank lines

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to raw backend output.
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = drop_lead_in(&s);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|plaintext|txt)?[ \t]*\r?\n(.*?)\r?\n```\s*$")
        .expect("static regex")
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Drop a conversational lead-in ────────────────────────────────────

static RE_LEAD_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:sure[,!.]?\s*)?(?:here\s+is|here's)\s+(?:the\s+)?(?:extracted|transcribed|corrected|recognized|recognised)?\s*(?:text|transcription|content)[^\n]*:[ \t]*\r?\n",
    )
    .expect("static regex")
});

fn drop_lead_in(input: &str) -> String {
    RE_LEAD_IN.replace(input, "").into_owned()
}

// ── Rule 3: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n\n")
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_outer_fences("```markdown\n# Hi\nthere\n```"), "# Hi\nthere");
        assert_eq!(strip_outer_fences("```\nplain\n```\n"), "plain");
        assert_eq!(strip_outer_fences("no fences"), "no fences");
    }

    #[test]
    fn inner_code_blocks_survive() {
        let input = "Intro\n```rust\nfn main() {}\n```\nOutro";
        assert_eq!(clean_text(input), input);
    }

    #[test]
    fn drops_lead_in() {
        assert_eq!(
            clean_text("Here is the transcribed text:\nInvoice 42"),
            "Invoice 42"
        );
        assert_eq!(
            clean_text("Sure! Here's the extracted text from the page:\nTotal"),
            "Total"
        );
        // Only a leading line is considered.
        assert_eq!(
            clean_text("Title\nHere is the text: body"),
            "Title\nHere is the text: body"
        );
    }

    #[test]
    fn line_endings_and_whitespace() {
        assert_eq!(clean_text("a  \r\nb\rc\t"), "a\nb\nc");
        assert_eq!(clean_text("page one\u{000C}page two"), "page one\n\npage two");
    }

    #[test]
    fn invisible_chars_and_blank_runs() {
        assert_eq!(clean_text("\u{FEFF}a\u{200B}b\n\n\n\n\n\nc"), "ab\n\n\nc");
    }

    #[test]
    fn trims_outer_blank_lines() {
        assert_eq!(clean_text("\n\n  text  \n\n"), "  text");
    }
}
