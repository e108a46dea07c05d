//! Defensive parsing of reasoning-service output.
//!
//! Candidates are tried in order of decreasing strictness: the raw text,
//! each fenced code block, then the first balanced brace-delimited
//! substring. Every candidate is also retried after a repair pass that drops
//! trailing commas and quotes bare keys. The first candidate that yields an
//! object with `overall_status` wins.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use change_state::{OverallStatus, ValidationResult, VerdictSource};

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// Candidate JSON texts, most strict first, without duplicates.
pub fn candidates(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !out.iter().any(|c| c == candidate) {
            out.push(candidate.to_string());
        }
    };
    push(text);
    if let Some(fence) = fence_pattern() {
        for capture in fence.captures_iter(text) {
            if let Some(body) = capture.get(1) {
                push(body.as_str());
            }
        }
    }
    if let Some(braced) = first_brace_block(text) {
        push(braced);
    }
    out
}

/// First `{ ... }` substring with balanced braces, ignoring braces inside
/// string literals.
pub fn first_brace_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
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
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tolerate trailing commas and unquoted object keys.
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
            }
            '{' => {
                expect_key = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                    expect_key = true;
                }
            }
            c if expect_key && (c.is_ascii_alphabetic() || c == '_') => {
                let end = chars[i..]
                    .iter()
                    .position(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
                    .map_or(chars.len(), |p| i + p);
                let ident: String = chars[i..end].iter().collect();
                let followed_by_colon = chars[end..]
                    .iter()
                    .find(|c| !c.is_whitespace())
                    .is_some_and(|c| *c == ':');
                if followed_by_colon {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                expect_key = false;
                i = end;
                continue;
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                expect_key = false;
                out.push(c);
            }
        }
        i += 1;
    }
    out
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    let as_object = |text: &str| match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };
    as_object(candidate).or_else(|| as_object(&repair_json(candidate)))
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match map.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_default()
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["description", "action", "risk", "text", "title"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string))
            .or_else(|| Some(item.to_string())),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn list_field(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match keys.iter().find_map(|key| map.get(*key)) {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn verdict_from_object(map: &Map<String, Value>) -> Option<ValidationResult> {
    let status = map.get("overall_status")?.as_str()?;
    let overall_status = OverallStatus::parse_lenient(status)?;
    let mut result = ValidationResult::new(overall_status, VerdictSource::ReasoningService);
    result.documentation_assessment = string_field(map, &["documentation_assessment"]);
    result.risks = list_field(map, &["risks", "identified_risks"]);
    result.required_actions = list_field(map, &["required_actions", "actions"]);
    result.synthesis = string_field(map, &["synthesis", "summary"]);
    Some(result)
}

/// Outcome of parsing one response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Verdict(ValidationResult),
    NoVerdict { candidates: usize },
}

/// Extract a verdict from free-form text.
pub fn parse_verdict(text: &str) -> ParseOutcome {
    let candidates = candidates(text);
    let tried = candidates.len();
    candidates
        .iter()
        .filter_map(|candidate| parse_object(candidate))
        .filter(|map| map.contains_key("overall_status"))
        .find_map(|map| verdict_from_object(&map))
        .map(ParseOutcome::Verdict)
        .unwrap_or(ParseOutcome::NoVerdict { candidates: tried })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_block_ignores_braces_in_strings() {
        let text = r#"Sure: {"a": "}{", "b": {"c": 1}} trailing"#;
        assert_eq!(first_brace_block(text), Some(r#"{"a": "}{", "b": {"c": 1}}"#));
        assert_eq!(first_brace_block("no json"), None);
        assert_eq!(first_brace_block("{ unbalanced"), None);
    }

    #[test]
    fn repair_trailing_commas_and_bare_keys() {
        let repaired = repair_json("{overall_status: \"REJECT\", risks: [\"a\", \"b\",],}");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["overall_status"], "REJECT");
        assert_eq!(value["risks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn repair_leaves_strings_alone() {
        let input = r#"{"note": "keep, this: {x,}"}"#;
        assert_eq!(repair_json(input), input);
    }

    #[test]
    fn fenced_candidates_are_extracted() {
        let text = "Here you go\n```json\n{\"overall_status\": \"APPROVE\"}\n```\n";
        let found = candidates(text);
        assert!(found.contains(&"{\"overall_status\": \"APPROVE\"}".to_string()));
    }

    #[test]
    fn object_without_status_is_skipped() {
        let text = "```json\n{\"note\": 1}\n```\n```json\n{\"overall_status\": \"reject\"}\n```";
        match parse_verdict(text) {
            ParseOutcome::Verdict(v) => assert_eq!(v.overall_status, OverallStatus::Reject),
            other => panic!("expected verdict, got {other:?}"),
        }
    }

    #[test]
    fn brace_block_with_trailing_comma_is_repaired() {
        let text = "Verdict follows: {\"overall_status\": \"approve\", \"risks\": [\"none\",],}";
        match parse_verdict(text) {
            ParseOutcome::Verdict(v) => {
                assert_eq!(v.overall_status, OverallStatus::Approve);
                assert_eq!(v.risks, vec!["none"]);
                assert_eq!(v.synthesized_by, VerdictSource::ReasoningService);
            }
            other => panic!("expected verdict, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_not_a_verdict() {
        assert_eq!(
            parse_verdict(r#"{"overall_status": "MAYBE"}"#),
            ParseOutcome::NoVerdict { candidates: 1 }
        );
    }
}
