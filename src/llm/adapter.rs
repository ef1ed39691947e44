//! Normalizes the shape of generation results.
//!
//! Providers and wrappers disagree on where the "real" output lives. The
//! adapter checks, in order: the value itself when it already has the
//! expected shape, then the accessor keys in [`OUTPUT_ACCESSOR_KEYS`], and
//! finally passes the raw value through for the caller to coerce.

use serde_json::Value;

use super::{Generation, OutputShape, ResponseMetadata};

/// Envelope keys probed for the primary output, highest priority first
pub const OUTPUT_ACCESSOR_KEYS: [&str; 3] = ["output", "data", "result"];

/// Provider side-channel keys probed for reasoning text, highest priority first
pub const REASONING_KEYS: [&str; 2] = ["reasoning_content", "reasoning"];

/// Where the primary value was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// The raw output already had the expected shape
    Direct,
    /// Found under an accessor key
    Accessor(&'static str),
    /// Nothing matched; raw output passed through
    Passthrough,
}

/// Find the value stored under the first populated accessor key
pub fn probe_accessor(raw: &Value) -> Option<(&'static str, &Value)> {
    let object = raw.as_object()?;
    OUTPUT_ACCESSOR_KEYS
        .iter()
        .find_map(|&key| object.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}

/// Pick the primary value out of a raw output
pub fn unwrap_output(raw: Value, shape: OutputShape) -> (Value, OutputSource) {
    if shape.conforms(&raw) {
        return (raw, OutputSource::Direct);
    }
    if let Some((key, value)) = probe_accessor(&raw) {
        return (value.clone(), OutputSource::Accessor(key));
    }
    (raw, OutputSource::Passthrough)
}

/// Best-effort reasoning text: `thinking` first, then the provider side channel
pub fn extract_reasoning(metadata: &ResponseMetadata) -> Option<String> {
    if let Some(thinking) = metadata.thinking.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(thinking.to_string());
    }
    REASONING_KEYS.iter().find_map(|&key| {
        metadata
            .provider_details
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

/// Split a generation into its primary value, source tag and reasoning
pub fn adapt(generation: Generation, shape: OutputShape) -> (Value, OutputSource, Option<String>) {
    let reasoning = extract_reasoning(&generation.metadata);
    let (value, source) = unwrap_output(generation.output, shape);
    (value, source, reasoning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StructuredKind;
    use serde_json::json;

    #[test]
    fn test_direct_text() {
        let (value, source) = unwrap_output(json!("hello"), OutputShape::Text);
        assert_eq!(value, json!("hello"));
        assert_eq!(source, OutputSource::Direct);
    }

    #[test]
    fn test_accessor_priority() {
        let raw = json!({"result": "third", "data": "second", "output": null});
        let (value, source) = unwrap_output(raw, OutputShape::Text);
        assert_eq!(value, json!("second"));
        assert_eq!(source, OutputSource::Accessor("data"));
    }

    #[test]
    fn test_structured_direct_wins_over_accessor() {
        let raw = json!({"best_id": "J1", "best_text": "joke", "rubric_summary": "", "result": "x"});
        let shape = OutputShape::Structured(StructuredKind::JokeSelection);
        let (_, source) = unwrap_output(raw, shape);
        assert_eq!(source, OutputSource::Direct);
    }

    #[test]
    fn test_passthrough() {
        let (value, source) = unwrap_output(json!(3), OutputShape::List);
        assert_eq!(value, json!(3));
        assert_eq!(source, OutputSource::Passthrough);
    }

    #[test]
    fn test_reasoning_prefers_thinking() {
        let generation = Generation::text("out")
            .with_thinking("thought")
            .with_provider_detail("reasoning_content", json!("side"));
        assert_eq!(extract_reasoning(&generation.metadata).as_deref(), Some("thought"));
    }

    #[test]
    fn test_reasoning_falls_back_to_provider_keys() {
        let generation = Generation::text("out")
            .with_thinking("   ")
            .with_provider_detail("reasoning_content", json!(""))
            .with_provider_detail("reasoning", json!("fallback"));
        assert_eq!(extract_reasoning(&generation.metadata).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_reasoning_absent() {
        let generation = Generation::text("out").with_provider_detail("reasoning", json!(42));
        assert!(extract_reasoning(&generation.metadata).is_none());
    }
}
