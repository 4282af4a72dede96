//! Lenient JSON extraction
//!
//! Validation prompts ask for JSON but models sometimes wrap it in prose or
//! Markdown fences. Extraction order: strip code fences, find the first
//! balanced `{…}` object, then parse. Returns `None` instead of erroring;
//! callers substitute their documented fallback values.

use serde_json::Value;

/// Extract and parse the first JSON object found in `text`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let stripped = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped.trim()) {
        if value.is_object() {
            return Some(value);
        }
    }

    let candidate = balanced_object(&stripped)?;
    serde_json::from_str(candidate).ok()
}

/// Remove a surrounding ```json … ``` (or plain ```) fence, if present.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\r', '\n']);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].to_string();
        }
        return rest.to_string();
    }

    // Fence somewhere inside the text.
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].to_string();
        }
    }

    trimmed.to_string()
}

/// First balanced `{…}` span, brace-matching with string awareness.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
