//! System prompts for vision recognition and text correction.
//!
//! Centralising prompts here keeps them in one place and lets tests inspect
//! them without a live model. Callers can override either default through
//! [`crate::config::BatchConfig::system_prompt`] and
//! [`crate::config::CorrectionConfig::prompt`].

/// Default system prompt for transcribing one page image.
pub const DEFAULT_RECOGNITION_PROMPT: &str = r#"You are a meticulous OCR engine. Transcribe all text visible in the provided document image.

Rules:
1. Preserve ALL text exactly as written, in natural reading order.
2. Keep paragraph breaks and list structure; render tables as GFM pipe tables.
3. Do not translate, summarise, or correct the wording.
4. Skip decorative elements, page numbers, and repeated running headers/footers.
5. If the image contains no text, answer with an empty response.

Output ONLY the transcribed text. Do NOT wrap it in code fences and do NOT add commentary."#;

/// Default system prompt for the correction pass.
pub const DEFAULT_CORRECTION_PROMPT: &str = r#"You are a careful proofreader for machine-transcribed documents. The user message contains OCR output.

Fix only recognition errors: misread characters, broken words split across lines, stray symbols, and obviously wrong spacing. Keep the original language, wording, order, line structure, page separators (lines consisting of "---"), and tables. Never add, remove, or summarise content.

Output ONLY the corrected text with no commentary and no code fences."#;

/// Extra instruction when a whole PDF is attached instead of a page image.
pub const MULTI_PAGE_SUFFIX: &str = r#"

The attachment is a multi-page document. Transcribe every page in order and separate consecutive pages with a line containing only "---"."#;

/// Build the recognition system prompt for one unit.
pub fn recognition_prompt(custom: Option<&str>, whole_document: bool) -> String {
    let base = custom.unwrap_or(DEFAULT_RECOGNITION_PROMPT);
    if whole_document {
        format!("{base}{MULTI_PAGE_SUFFIX}")
    } else {
        base.to_string()
    }
}
