//! Pulls the JSON object out of free-form model output.

use thiserror::Error;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SanitizeError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("JSON object starting at byte {start} has unbalanced braces")]
    Unbalanced { start: usize },
}

/// Returns the first complete `{ ... }` object in `raw`.
///
/// A fenced block (```` ```json ```` or bare ```` ``` ````) is preferred when
/// present; otherwise the whole response is scanned, so leading or trailing
/// prose is ignored either way. Braces inside string literals do not count.
pub fn extract_json(raw: &str) -> Result<&str, SanitizeError> {
    if let Some(body) = fenced_body(raw) {
        if body.contains('{') {
            return first_object(body);
        }
    }
    first_object(raw)
}

fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after = &text[open + FENCE.len()..];
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];
    let body = match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    Some(body.trim())
}

fn first_object(text: &str) -> Result<&str, SanitizeError> {
    let start = text.find('{').ok_or(SanitizeError::NoJsonObject)?;
    let len = matching_brace_len(&text[start..]).ok_or(SanitizeError::Unbalanced { start })?;
    Ok(&text[start..start + len])
}

/// Byte length of the object opening at `text[0]`, closing brace included.
fn matching_brace_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
