//! Structured payload extraction from free-text model output.

use serde::de::DeserializeOwned;

use crate::error::{PromptError, PromptResult};

/// Slice the JSON object out of a model completion.
///
/// Takes everything from the first `{` to the last `}` of the trimmed text,
/// inclusive. The scan is greedy and not nesting-aware: braces inside string
/// values or stray braces in surrounding prose widen the slice, and the
/// decoder then rejects it.
pub fn extract_json(raw: &str) -> PromptResult<&str> {
    let trimmed = raw.trim();

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&trimmed[start..=end]),
        _ => Err(PromptError::MalformedModelOutput {
            message: format!(
                "no JSON object found in model output. First 100 chars: '{}'",
                trimmed.chars().take(100).collect::<String>()
            ),
        }),
    }
}

/// Extract and decode a structured record from a model completion.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> PromptResult<T> {
    let json = extract_json(raw)?;
    serde_json::from_str(json).map_err(|e| PromptError::MalformedModelOutput {
        message: format!("invalid JSON structure: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: i64,
    }

    #[test]
    fn test_extracts_object_surrounded_by_noise() {
        assert_eq!(extract_json("noise {\"a\":1} trailing").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extracts_bare_object() {
        assert_eq!(extract_json("  {\"a\":1}\n").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_missing_open_brace_fails() {
        let err = extract_json("\"a\":1}").unwrap_err();
        assert!(matches!(err, PromptError::MalformedModelOutput { .. }));
    }

    #[test]
    fn test_missing_close_brace_fails() {
        let err = extract_json("{\"a\":1").unwrap_err();
        assert!(matches!(err, PromptError::MalformedModelOutput { .. }));
    }

    #[test]
    fn test_reversed_braces_fail() {
        assert!(extract_json("} nothing here {").is_err());
    }

    #[test]
    fn test_greedy_slice_spans_first_open_to_last_close() {
        let raw = "prefix { stray {\"a\":1} suffix";
        assert_eq!(extract_json(raw).unwrap(), "{ stray {\"a\":1}");
    }

    #[test]
    fn test_greedy_slice_with_extra_open_brace_is_rejected_on_decode() {
        let raw = "prefix { stray {\"a\":1} suffix";
        let err = parse_structured::<Value>(raw).unwrap_err();
        assert!(matches!(err, PromptError::MalformedModelOutput { .. }));
    }

    #[test]
    fn test_greedy_slice_spans_two_objects() {
        let raw = "{\"a\":1} and then {\"a\":2}";
        assert_eq!(extract_json(raw).unwrap(), raw);
        assert!(parse_structured::<Sample>(raw).is_err());
    }

    #[test]
    fn test_close_brace_inside_string_value_is_kept() {
        let raw = "result: {\"a\":1,\"note\":\"ends with }\"} done";
        let value: Value = parse_structured(raw).unwrap();
        assert_eq!(value["note"], "ends with }");
    }

    #[test]
    fn test_parse_structured_decodes_typed_record() {
        let sample: Sample = parse_structured("Here you go: {\"a\": 7}. Thanks!").unwrap();
        assert_eq!(sample, Sample { a: 7 });
    }

    #[test]
    fn test_parse_structured_rejects_wrong_shape() {
        let err = parse_structured::<Sample>("{\"b\": 7}").unwrap_err();
        assert!(err.to_string().contains("invalid JSON structure"));
    }
}
