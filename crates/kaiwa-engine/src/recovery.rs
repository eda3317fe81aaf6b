//! Structured-output recovery: coerce an arbitrary model text blob into a
//! well-typed [`TurnResult`].
//!
//! The cascade is an explicit ordered strategy chain — each strategy either
//! yields a JSON object or passes to the next — so the ordering and each
//! fallback's precondition stay visible and independently testable.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use kaiwa_core::errors::TurnError;
use kaiwa_core::turn::{TurnResult, TurnStatus};

/// Which strategy produced the recovered object. Logged per turn; a rising
/// salvage rate is the early signal that the prompt contract is drifting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryStrategy {
    DirectParse,
    BraceExtraction,
    FieldSalvage,
}

impl RecoveryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectParse => "direct_parse",
            Self::BraceExtraction => "brace_extraction",
            Self::FieldSalvage => "field_salvage",
        }
    }
}

/// A recovered turn together with the strategy that won.
#[derive(Clone, Debug)]
pub struct Recovered {
    pub result: TurnResult,
    pub strategy: RecoveryStrategy,
}

/// Recover a [`TurnResult`] from raw model output. First success wins;
/// normalization failures (a model-signaled error turn) are hard failures
/// regardless of which strategy parsed the object.
pub fn recover(raw: &str) -> Result<Recovered, TurnError> {
    let stripped = strip_fences(raw);

    const STRATEGIES: &[(RecoveryStrategy, fn(&str) -> Option<Value>)] = &[
        (RecoveryStrategy::DirectParse, direct_parse),
        (RecoveryStrategy::BraceExtraction, brace_extract),
        (RecoveryStrategy::FieldSalvage, field_salvage),
    ];

    for (strategy, attempt) in STRATEGIES {
        if let Some(object) = attempt(&stripped) {
            let result = normalize(object)?;
            return Ok(Recovered {
                result,
                strategy: *strategy,
            });
        }
    }

    Err(TurnError::NoJsonFound)
}

/// Strip a leading fenced-block marker (bare or language-tagged) and the
/// matching trailing marker.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    static OPEN: OnceLock<Regex> = OnceLock::new();
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    let open = OPEN.get_or_init(|| Regex::new(r"^```[A-Za-z]*[ \t]*\n?").expect("valid regex"));
    let close = CLOSE.get_or_init(|| Regex::new(r"\n?```[ \t]*$").expect("valid regex"));

    let without_open = open.replace(trimmed, "");
    close.replace(&without_open, "").trim().to_string()
}

/// Parse the whole text as a single JSON object.
fn direct_parse(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Scan forward from the first `{`, tracking nesting depth (string- and
/// escape-aware), and parse the first balanced span.
fn brace_extract(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let span = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str::<Value>(span).ok().filter(Value::is_object);
                }
            }
            _ => {}
        }
    }
    None
}

/// Per-field pattern extraction for output that is not valid JSON at all.
/// Requires a non-empty `reply` match to count as a success.
fn field_salvage(text: &str) -> Option<Value> {
    let reply = salvage_string(text, "reply")?;
    if reply.is_empty() {
        return None;
    }

    let mut object = serde_json::Map::new();
    object.insert("reply".into(), Value::String(reply));
    for key in SALVAGE_KEYS.iter().skip(1) {
        if let Some(value) = salvage_string(text, key) {
            object.insert(key.to_string(), Value::String(value));
        }
    }
    if let Some(status) = salvage_status(text) {
        object.insert("status".into(), Value::String(status));
    }
    Some(Value::Object(object))
}

const SALVAGE_KEYS: &[&str] = &[
    "reply",
    "translation",
    "user_raw_transcript",
    "user_normalized",
    "suggestion",
];

/// Match `"<key>" : "<content>"` (quotes around the key optional), tolerant
/// of escaped quotes and embedded newlines in the content.
fn salvage_string(text: &str, key: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        SALVAGE_KEYS
            .iter()
            .map(|key| {
                let re = Regex::new(&format!(r#"(?s)"?{key}"?\s*:\s*"((?:[^"\\]|\\.)*)""#))
                    .expect("valid regex");
                (*key, re)
            })
            .collect()
    });

    let (_, re) = patterns.iter().find(|(k, _)| *k == key)?;
    re.captures(text)
        .map(|caps| unescape(caps.get(1).map(|m| m.as_str()).unwrap_or_default()))
}

fn salvage_status(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#""?status"?\s*:\s*"(\w+)""#).expect("valid regex"));
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Minimal JSON-string unescaper for salvaged fragments. Unknown escapes are
/// kept verbatim rather than dropped.
fn unescape(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut chars = fragment.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Coerce a parsed object into a [`TurnResult`]: default missing textual
/// fields, collapse `suggestion` to a single string or null, and treat a
/// literal "error" reply as a model-signaled failure.
fn normalize(object: Value) -> Result<TurnResult, TurnError> {
    let map = match object {
        Value::Object(map) => map,
        _ => return Err(TurnError::NoJsonFound),
    };

    let text_field = |key: &str| -> String {
        map.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let reply = text_field("reply");
    if reply.trim().eq_ignore_ascii_case("error") {
        return Err(TurnError::ModelSignaledError);
    }

    let suggestion = match map.get("suggestion") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    let status = match map.get("status").and_then(Value::as_str) {
        Some("FINISHED") => TurnStatus::Finished,
        Some("ERROR") => TurnStatus::Error,
        _ => TurnStatus::Continue,
    };

    Ok(TurnResult {
        user_raw_transcript: text_field("user_raw_transcript"),
        user_normalized: text_field("user_normalized"),
        reply,
        translation: text_field("translation"),
        suggestion,
        status,
    })
}

/// Extract a bare JSON object from raw model output without turn-field
/// normalization. Used by the composition flows, which share the model's
/// fenced-output habits but not the turn schema.
pub fn extract_json(raw: &str) -> Option<Value> {
    let stripped = strip_fences(raw);
    direct_parse(&stripped).or_else(|| brace_extract(&stripped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_recovers_via_direct_parse() {
        let raw = "```json\n{\"reply\":\"Hi\",\"translation\":\"嗨\",\"status\":\"CONTINUE\"}\n```";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::DirectParse);
        assert_eq!(recovered.result.reply, "Hi");
        assert_eq!(recovered.result.translation, "嗨");
        assert_eq!(recovered.result.status, TurnStatus::Continue);
        assert!(recovered.result.suggestion.is_none());
        assert_eq!(recovered.result.user_raw_transcript, "");
        assert_eq!(recovered.result.user_normalized, "");
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let raw = "```\n{\"reply\":\"はい\"}\n```";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::DirectParse);
        assert_eq!(recovered.result.reply, "はい");
    }

    #[test]
    fn prose_wrapped_json_recovers_via_brace_extraction() {
        let raw = "Sure! {\"reply\":\"Hi\",\"translation\":\"嗨\"} extra trailing junk";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::BraceExtraction);
        assert_eq!(recovered.result.reply, "Hi");
        assert_eq!(recovered.result.translation, "嗨");
        // No status field: implementation default.
        assert_eq!(recovered.result.status, TurnStatus::Continue);
    }

    #[test]
    fn brace_extraction_ignores_braces_inside_strings() {
        let raw = "note: {\"reply\":\"set {and} unset\",\"translation\":\"好\"} tail";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::BraceExtraction);
        assert_eq!(recovered.result.reply, "set {and} unset");
    }

    #[test]
    fn nested_objects_balance() {
        let raw = "x {\"reply\":\"ok\",\"extra\":{\"a\":1}} y";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::BraceExtraction);
        assert_eq!(recovered.result.reply, "ok");
    }

    #[test]
    fn non_json_recovers_via_field_salvage() {
        let raw = "reply: \"Hello?\" translation: \"你好?\"";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::FieldSalvage);
        assert_eq!(recovered.result.reply, "Hello?");
        assert_eq!(recovered.result.translation, "你好?");
    }

    #[test]
    fn salvage_handles_escapes_and_newlines() {
        let raw = "broken json \"reply\": \"line one\\nline \\\"two\\\"\", \"status\": \"FINISHED\"";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::FieldSalvage);
        assert_eq!(recovered.result.reply, "line one\nline \"two\"");
        assert_eq!(recovered.result.status, TurnStatus::Finished);
    }

    #[test]
    fn salvage_requires_nonempty_reply() {
        let raw = "\"reply\": \"\" \"translation\": \"嗨\"";
        assert!(matches!(recover(raw), Err(TurnError::NoJsonFound)));
    }

    #[test]
    fn no_json_at_all() {
        assert!(matches!(
            recover("the model just chatted instead"),
            Err(TurnError::NoJsonFound)
        ));
    }

    #[test]
    fn model_signaled_error_beats_clean_parse() {
        assert!(matches!(
            recover("{\"reply\":\"error\"}"),
            Err(TurnError::ModelSignaledError)
        ));
        assert!(matches!(
            recover("{\"reply\":\"  Error \"}"),
            Err(TurnError::ModelSignaledError)
        ));
        assert!(matches!(
            recover("{\"reply\":\"ERROR\",\"translation\":\"嗨\"}"),
            Err(TurnError::ModelSignaledError)
        ));
    }

    #[test]
    fn suggestion_list_collapses_to_first_element() {
        let raw = "{\"reply\":\"ok\",\"suggestion\":[\"use です\",\"second\"]}";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.result.suggestion.as_deref(), Some("use です"));
    }

    #[test]
    fn suggestion_unexpected_types_discarded() {
        for payload in [
            "{\"reply\":\"ok\",\"suggestion\":42}",
            "{\"reply\":\"ok\",\"suggestion\":{\"a\":1}}",
            "{\"reply\":\"ok\",\"suggestion\":[]}",
            "{\"reply\":\"ok\",\"suggestion\":[1,2]}",
            "{\"reply\":\"ok\",\"suggestion\":null}",
        ] {
            let recovered = recover(payload).unwrap();
            assert!(recovered.result.suggestion.is_none(), "payload: {payload}");
        }
    }

    #[test]
    fn wrong_field_types_default_to_empty() {
        let raw = "{\"reply\":\"ok\",\"translation\":7,\"user_raw_transcript\":null}";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.result.translation, "");
        assert_eq!(recovered.result.user_raw_transcript, "");
    }

    #[test]
    fn happy_path_is_idempotent() {
        let raw = "{\"reply\":\"それは良かったね。\",\"translation\":\"那太好了。\",\"user_raw_transcript\":\"えっと、那个\",\"user_normalized\":\"ええと\",\"suggestion\":\"語尾\",\"status\":\"CONTINUE\"}";
        let first = recover(raw).unwrap().result;
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = recover(&reserialized).unwrap().result;
        assert_eq!(second.reply, first.reply);
        assert_eq!(second.translation, first.translation);
        assert_eq!(second.user_raw_transcript, first.user_raw_transcript);
        assert_eq!(second.user_normalized, first.user_normalized);
        assert_eq!(second.suggestion, first.suggestion);
        assert_eq!(second.status, first.status);
    }

    #[test]
    fn recovered_translation_distinct_from_reply() {
        let raw = "```json\n{\"reply\":\"今日もお疲れさま。\",\"translation\":\"今天也辛苦了。\",\"status\":\"CONTINUE\"}\n```";
        let recovered = recover(raw).unwrap().result;
        assert!(!recovered.translation.is_empty());
        assert_ne!(recovered.translation, recovered.reply);
    }

    #[test]
    fn extract_json_for_composition_payloads() {
        let fenced = "```json\n{\"title\":\"今日\"}\n```";
        assert_eq!(extract_json(fenced).unwrap()["title"], "今日");

        let wrapped = "Here you go {\"title\":\"回響\"} done";
        assert_eq!(extract_json(wrapped).unwrap()["title"], "回響");

        assert!(extract_json("no structure here").is_none());
    }

    #[test]
    fn truncated_json_falls_through_to_salvage() {
        // Unbalanced braces: direct parse and brace extraction both fail.
        let raw = "{\"reply\":\"続きが切れた\",\"translation\":\"被截断了";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.strategy, RecoveryStrategy::FieldSalvage);
        assert_eq!(recovered.result.reply, "続きが切れた");
    }
}
