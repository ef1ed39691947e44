use serde_json::Value;

/// Placeholder substituted for empty prompt inputs
pub const NO_INPUT_SENTINEL: &str = "[NO INPUT PROVIDED]";

/// Trim text before it is embedded in a prompt, substituting the sentinel when empty
pub fn normalize_input(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        NO_INPUT_SENTINEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Coerce a model output value to plain text.
///
/// Strings are trimmed, `null` becomes empty, and anything structured is
/// rendered as canonical JSON (compact, object keys sorted).
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => canonical_json(other),
    }
}

/// Compact JSON with sorted object keys.
///
/// `serde_json::Map` is ordered by key unless `preserve_order` is enabled,
/// which this crate does not do.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Render items as `1. a\n2. b`, collapsing whitespace inside each item
pub fn format_numbered_list(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let normalized = item.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("{}. {}", i + 1, normalized)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
