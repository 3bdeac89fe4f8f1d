//! JSON extraction from free-text model replies.
//!
//! Models wrap their JSON in markdown fences, preface it with prose or
//! trail off with commentary. [`extract_json`] digs the value out and
//! degrades to `None` instead of failing.

use serde_json::Value;

/// Extract the first JSON value from a model reply.
///
/// Strips code-fence markers and tries a direct parse, then falls back to
/// the first balanced `[...]` or `{...}` span that parses.
pub fn extract_json(raw: &str) -> Option<Value> {
    let clean = strip_fences(raw);
    let clean = clean.trim();
    if clean.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(clean) {
        return Some(value);
    }

    clean
        .char_indices()
        .filter(|(_, c)| *c == '[' || *c == '{')
        .filter_map(|(start, _)| balanced_span(&clean[start..]))
        .find_map(|span| serde_json::from_str::<Value>(span).ok())
}

/// Extract a JSON array, or `None` for anything else.
pub fn extract_array(raw: &str) -> Option<Vec<Value>> {
    match extract_json(raw)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```JSON", "").replace("```", "")
}

/// The balanced bracket span starting at the first byte of `text`.
///
/// String literals are skipped so brackets inside them do not count.
fn balanced_span(text: &str) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
