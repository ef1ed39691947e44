use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// `1. item`, `2) item`, `3: item`, `4 - item`
static NUMBERED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*[).:\-]\s+(.*)$").expect("NUMBERED_ITEM_RE regex should compile")
});

/// `- item`, `* item`, `+ item`
static BULLET_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*+]\s+(.*)$").expect("BULLET_ITEM_RE regex should compile")
});

const FENCE: &str = "```";

/// Result of coercing a list-shaped stage output to its target count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOutcome {
    /// Items kept after truncation, in source order
    pub items: Vec<String>,
    /// Requested item count (0 disables the count check)
    pub expected: usize,
    /// Number of items recovered before truncation
    pub extracted: usize,
}

impl ListOutcome {
    /// Whether the recovered count differed from the requested one
    pub fn is_mismatch(&self) -> bool {
        self.expected > 0 && self.extracted != self.expected
    }

    pub fn was_truncated(&self) -> bool {
        self.extracted > self.items.len()
    }
}

/// Extract a list and apply the count policy; `label` names the source in warnings
pub fn coerce_list(label: &str, raw: &Value, expected: usize) -> ListOutcome {
    enforce_count(label, extract_list(raw), expected)
}

/// Apply the count policy to an already extracted list.
///
/// A count mismatch is never an error: it is logged as a warning and the
/// list is truncated to `expected` when it is longer.
pub fn enforce_count(label: &str, mut items: Vec<String>, expected: usize) -> ListOutcome {
    let extracted = items.len();
    if expected > 0 && extracted > expected {
        items.truncate(expected);
    }

    let outcome = ListOutcome {
        items,
        expected,
        extracted,
    };
    if outcome.is_mismatch() {
        warn!("{} expected {} items, got {}", label, expected, extracted);
    }
    debug!("{}: kept {} of {} extracted items", label, outcome.items.len(), extracted);

    outcome
}

/// Recover an ordered list of clean, non-empty items from a model output.
///
/// Sequences are taken element by element. Anything else is treated as a
/// text blob: code fences are stripped, a JSON array is preferred when the
/// text looks like one, and otherwise numbered and bulleted lines are
/// split into items with unlabeled lines folded into the current item.
pub fn extract_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(elements) => clean_items(elements.iter().map(element_text)),
        Value::String(text) => extract_list_from_text(text),
        other => extract_list_from_text(&other.to_string()),
    }
}

/// Text-blob path of [`extract_list`]
pub fn extract_list_from_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let text = strip_code_fence(text);
    let text = text.trim();

    if text.starts_with('[') {
        if let Ok(Value::Array(elements)) = serde_json::from_str::<Value>(text) {
            return clean_items(elements.iter().map(element_text));
        }
    }

    clean_items(split_items(text).into_iter().map(Cow::Owned))
}

/// Remove a wrapping code fence and its language tag.
///
/// The text is returned untouched unless the closing fence is present on
/// the last line.
pub fn strip_code_fence(text: &str) -> Cow<'_, str> {
    let text = text.trim();
    if !text.starts_with(FENCE) {
        return Cow::Borrowed(text);
    }

    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return Cow::Borrowed(text);
    }
    if !lines[lines.len() - 1].trim().starts_with(FENCE) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(lines[1..lines.len() - 1].join("\n").trim().to_string())
}

/// Strip one leading numbering or bullet label
pub fn strip_leading_label(text: &str) -> &str {
    let text = text.trim();
    match_marker(text).unwrap_or(text)
}

fn split_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match match_marker(line) {
            Some(rest) => {
                flush(&mut items, &mut buffer);
                buffer.push(rest);
            }
            // Unlabeled leading prose starts its own item
            None => buffer.push(line),
        }
    }
    flush(&mut items, &mut buffer);

    items
}

fn flush(items: &mut Vec<String>, buffer: &mut Vec<&str>) {
    if !buffer.is_empty() {
        items.push(buffer.join(" ").trim().to_string());
        buffer.clear();
    }
}

fn match_marker(line: &str) -> Option<&str> {
    NUMBERED_ITEM_RE
        .captures(line)
        .and_then(|caps| caps.get(2))
        .or_else(|| BULLET_ITEM_RE.captures(line).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().trim())
}

fn element_text(element: &Value) -> Cow<'_, str> {
    match element {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn clean_items<'a>(items: impl Iterator<Item = Cow<'a, str>>) -> Vec<String> {
    items
        .map(|item| strip_leading_label(&item).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
