//! JSON extraction helpers for LLM responses.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:[a-zA-Z0-9]*)\s*\n?([\s\S]*?)\n?\s*```").expect("valid regex"));

static THINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Remove `<think>` blocks and unwrap a fenced code block if present.
pub fn remove_code_blocks(content: &str) -> String {
    let content = THINK_TAG.replace_all(content.trim(), "");
    let content = content.trim();

    match CODE_FENCE.captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => content.to_string(),
    }
}

/// Slice from the first `{` to the last `}`, dropping any prose around an object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}
