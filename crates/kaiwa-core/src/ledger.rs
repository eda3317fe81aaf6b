use serde::{Deserialize, Serialize};

use crate::turn::TurnResult;

/// Speaker of a ledger entry or history turn. The legacy wire form used
/// "model" for the persona side; both deserialize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model", alias = "persona")]
    Persona,
}

/// Minimal role/content history element submitted by the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn persona(content: impl Into<String>) -> Self {
        Self { role: Role::Persona, content: content.into() }
    }
}

/// Number of user turns in a history slice. The current utterance counts,
/// so this is the round index when called on a full request history.
pub fn user_turn_count(history: &[ChatTurn]) -> usize {
    history.iter().filter(|t| t.role == Role::User).count()
}

/// One record in the append-only conversation ledger.
///
/// Entries reconstructed from minimal history carry only `role`/`content`;
/// enrichment fields stay absent rather than being fabricated. One struct
/// with optional enrichment — never two incompatible shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl LedgerEntry {
    /// Bare role/content entry, as replayed from minimal history.
    pub fn bare(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            raw_transcript: None,
            normalized: None,
            reply: None,
            translation: None,
            suggestion: None,
        }
    }

    /// User entry enriched with the transcription fields of a recovered turn.
    pub fn user_enriched(
        content: impl Into<String>,
        raw_transcript: impl Into<String>,
        normalized: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            raw_transcript: Some(raw_transcript.into()),
            normalized: Some(normalized.into()),
            reply: None,
            translation: None,
            suggestion: None,
        }
    }

    /// Persona entry built from a recovered turn result.
    pub fn persona_from(result: &TurnResult) -> Self {
        Self {
            role: Role::Persona,
            content: result.reply.clone(),
            raw_transcript: None,
            normalized: None,
            reply: Some(result.reply.clone()),
            translation: Some(result.translation.clone()),
            suggestion: result.suggestion.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnStatus;

    #[test]
    fn role_wire_form() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Persona).unwrap(), r#""model""#);
        let legacy: Role = serde_json::from_str(r#""model""#).unwrap();
        assert_eq!(legacy, Role::Persona);
        let canonical: Role = serde_json::from_str(r#""persona""#).unwrap();
        assert_eq!(canonical, Role::Persona);
    }

    #[test]
    fn user_turn_counting() {
        let history = vec![
            ChatTurn::persona("はじめまして"),
            ChatTurn::user("こんにちは"),
            ChatTurn::persona("今日はどうでしたか"),
            ChatTurn::user("忙しかったです"),
        ];
        assert_eq!(user_turn_count(&history), 2);
        assert_eq!(user_turn_count(&[]), 0);
    }

    #[test]
    fn bare_entry_omits_enrichment_on_wire() {
        let entry = LedgerEntry::bare(Role::User, "こんにちは");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "こんにちは");
        assert!(json.get("raw_transcript").is_none());
        assert!(json.get("reply").is_none());
    }

    #[test]
    fn persona_entry_carries_turn_fields() {
        let result = TurnResult {
            user_raw_transcript: "那个、えっと".into(),
            user_normalized: "ええと".into(),
            reply: "なるほどね。".into(),
            translation: "原来如此。".into(),
            suggestion: Some("語尾に注意".into()),
            status: TurnStatus::Continue,
        };
        let entry = LedgerEntry::persona_from(&result);
        assert_eq!(entry.role, Role::Persona);
        assert_eq!(entry.content, "なるほどね。");
        assert_eq!(entry.reply.as_deref(), Some("なるほどね。"));
        assert_eq!(entry.translation.as_deref(), Some("原来如此。"));
        assert_eq!(entry.suggestion.as_deref(), Some("語尾に注意"));
        assert!(entry.raw_transcript.is_none());
    }

    #[test]
    fn enriched_entry_roundtrip_preserves_fields() {
        let entry = LedgerEntry::user_enriched("忙しかった", "忙しかった、就是很忙", "忙しかったです");
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.raw_transcript.as_deref(), Some("忙しかった、就是很忙"));
        assert_eq!(parsed.normalized.as_deref(), Some("忙しかったです"));
    }
}
