use serde::{Deserialize, Serialize};

/// Lifecycle status of a dialogue turn, as emitted on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    #[default]
    #[serde(rename = "CONTINUE")]
    Continue,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "ERROR")]
    Error,
}

/// One model-produced turn coerced into a strict structured record.
///
/// All textual fields are guaranteed present (empty string default) after
/// recovery, no matter how little of the raw model output was salvageable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResult {
    /// Verbatim, language-preserving transcription of the user's latest
    /// utterance. Mixed-language input stays mixed.
    #[serde(default)]
    pub user_raw_transcript: String,
    /// The user's intent rendered as natural Japanese.
    #[serde(default)]
    pub user_normalized: String,
    /// Persona utterance for this turn, Japanese only.
    #[serde(default)]
    pub reply: String,
    /// Simplified-Chinese translation of `reply`. Never equal to `reply`.
    #[serde(default)]
    pub translation: String,
    /// Optional coaching note. Always a single string or absent.
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub status: TurnStatus,
}

impl TurnResult {
    /// A user-presentable fallback turn for unrecoverable failures. Carries
    /// no model text, only a canned apology.
    pub fn error_turn(reply: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            user_raw_transcript: String::new(),
            user_normalized: String::new(),
            reply: reply.into(),
            translation: translation.into(),
            suggestion: None,
            status: TurnStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == TurnStatus::Error
    }

    pub fn is_finished(&self) -> bool {
        self.status == TurnStatus::Finished
    }
}
