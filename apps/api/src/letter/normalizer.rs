//! Response Normalizer — recovers the letter body from unreliable provider output.
//!
//! The provider is asked for `{"BodyParagraphs": "..."}` but may wrap it in code
//! fences, surround it with chatter, break the JSON, or drop the field entirely.
//! [`normalize_response`] never fails: when every parse attempt misses it falls
//! back to [`DEFAULT_BODY`] and logs the miss.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::letter::models::NormalizedBody;

/// The one field the provider must return.
pub const BODY_FIELD: &str = "BodyParagraphs";

/// Used when nothing usable can be recovered from the provider output.
pub const DEFAULT_BODY: &str = "I am writing to express my strong interest in this position. \
    My background and experience have prepared me to contribute from day one, and I am \
    excited by the opportunity to bring my skills to your team.\n\n\
    I would welcome the chance to discuss how my experience aligns with your needs. \
    Thank you for your time and consideration.";

static OBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("OBJECT_PATTERN regex should compile"));

/// Which stage of the fallback chain produced the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStage {
    Direct,
    Embedded,
    Default,
}

/// Runs the fallback chain and returns the body together with the stage that produced it.
pub fn normalize_with_stage(raw: &str) -> (NormalizedBody, NormalizeStage) {
    let stages: [(NormalizeStage, fn(&str) -> Option<NormalizedBody>); 2] = [
        (NormalizeStage::Direct, parse_direct),
        (NormalizeStage::Embedded, parse_embedded),
    ];

    for (stage, attempt) in stages {
        if let Some(body) = attempt(raw) {
            debug!("Provider output normalized at stage {stage:?}");
            return (body, stage);
        }
    }

    warn!(
        raw_len = raw.len(),
        preview = %raw.chars().take(80).collect::<String>(),
        "Provider output had no usable {BODY_FIELD}; using default body"
    );
    (default_body(), NormalizeStage::Default)
}

/// Recovers a non-empty body from raw provider output. Never fails.
pub fn normalize_response(raw: &str) -> NormalizedBody {
    normalize_with_stage(raw).0
}

pub fn default_body() -> NormalizedBody {
    NormalizedBody::new(DEFAULT_BODY).unwrap_or_else(|| unreachable!("DEFAULT_BODY is not blank"))
}

/// Stage 1: strip fences and parse the whole text.
fn parse_direct(raw: &str) -> Option<NormalizedBody> {
    body_from_json(strip_fences(raw))
}

/// Stage 2: parse the brace-delimited span embedded in surrounding text.
fn parse_embedded(raw: &str) -> Option<NormalizedBody> {
    let text = strip_fences(raw);
    let candidate = OBJECT_PATTERN.find(text)?;
    body_from_json(candidate.as_str())
}

/// Parses `text` as a JSON object and extracts the body field.
///
/// Accepts a string, or an array of strings joined as paragraphs.
fn body_from_json(text: &str) -> Option<NormalizedBody> {
    let value: Value = serde_json::from_str(text).ok()?;
    let field = value.as_object()?.get(BODY_FIELD)?;
    let prose = match field {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => return None,
    };
    NormalizedBody::new(prose)
}

/// Removes ```json / ``` fence markers and surrounding whitespace.
fn strip_fences(text: &str) -> &str {
    let mut text = text.trim();
    for opener in ["```json", "```JSON", "```"] {
        if let Some(rest) = text.strip_prefix(opener) {
            text = rest.trim_start();
            break;
        }
    }
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_is_parsed_directly() {
        let raw = "```json\n{\"BodyParagraphs\":\"text\"}\n```";
        let (body, stage) = normalize_with_stage(raw);
        assert_eq!(body.as_str(), "text");
        assert_eq!(stage, NormalizeStage::Direct);
    }

    #[test]
    fn test_bare_fence_without_language_tag() {
        let raw = "```\n{\"BodyParagraphs\": \"Dear team\"}\n```";
        assert_eq!(normalize_response(raw).as_str(), "Dear team");
    }

    #[test]
    fn test_plain_json_is_parsed_directly() {
        let raw = r#"  {"BodyParagraphs": "I build things.", "Extra": 1}  "#;
        let (body, stage) = normalize_with_stage(raw);
        assert_eq!(body.as_str(), "I build things.");
        assert_eq!(stage, NormalizeStage::Direct);
    }

    #[test]
    fn test_json_embedded_in_chatter_is_recovered() {
        let raw = "Sure! Here is your letter:\n{\"BodyParagraphs\": \"Embedded body\"}\nHope this helps.";
        let (body, stage) = normalize_with_stage(raw);
        assert_eq!(body.as_str(), "Embedded body");
        assert_eq!(stage, NormalizeStage::Embedded);
    }

    #[test]
    fn test_not_json_at_all_falls_back_to_default() {
        let (body, stage) = normalize_with_stage("not json at all");
        assert_eq!(body.as_str(), DEFAULT_BODY.trim());
        assert_eq!(stage, NormalizeStage::Default);
    }

    #[test]
    fn test_missing_field_falls_back_to_default() {
        let body = normalize_response(r#"{"body": "wrong field name"}"#);
        assert_eq!(body, default_body());
    }

    #[test]
    fn test_blank_field_falls_back_to_default() {
        let body = normalize_response(r#"{"BodyParagraphs": "   "}"#);
        assert_eq!(body, default_body());
    }

    #[test]
    fn test_non_string_field_falls_back_to_default() {
        let body = normalize_response(r#"{"BodyParagraphs": 42}"#);
        assert_eq!(body, default_body());
    }

    #[test]
    fn test_array_field_is_joined_into_paragraphs() {
        let body = normalize_response(r#"{"BodyParagraphs": ["First.", "Second."]}"#);
        assert_eq!(body.as_str(), "First.\n\nSecond.");
    }

    #[test]
    fn test_truncated_json_falls_back_to_default() {
        let body = normalize_response("```json\n{\"BodyParagraphs\": \"cut off");
        assert_eq!(body, default_body());
    }

    #[test]
    fn test_empty_input_falls_back_to_default() {
        assert_eq!(normalize_response(""), default_body());
    }

    #[test]
    fn test_escaped_latex_sequences_survive_json_decoding() {
        let raw = r#"{"BodyParagraphs": "Intro\\\\\\begin{itemize}\\item One\\end{itemize}"}"#;
        let body = normalize_response(raw);
        assert_eq!(body.as_str(), r"Intro\\\begin{itemize}\item One\end{itemize}");
    }

    #[test]
    fn test_strip_fences_leaves_unfenced_text_alone() {
        assert_eq!(strip_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }
}
