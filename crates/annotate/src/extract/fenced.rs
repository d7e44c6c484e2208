use serde_json::Value;

pub(crate) const YAML_FENCE: &str = "---";

pub(crate) fn is_yaml_fence(line: &str) -> bool {
    line.trim() == YAML_FENCE
}

/// Parse a fenced YAML document into a JSON value; empty documents yield `None`.
pub(crate) fn parse_yaml(text: &str) -> Result<Option<Value>, String> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(format!("invalid YAML block: {e}")),
    }
}

/// Byte length of the balanced `{...}` object at the start of `text`,
/// skipping braces inside string literals.
pub(crate) fn balanced_object_len(text: &str) -> Option<usize> {
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
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
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid JSON block: {e}"))
}
