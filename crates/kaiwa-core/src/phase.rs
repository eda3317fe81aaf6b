use serde::{Deserialize, Serialize};

/// Position of a turn relative to the configured turn quota. Selects which
/// phase of persona instruction the model is invoked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No prior turns at all — the model originates the opening question
    /// from the seed topic rather than responding to an utterance.
    First,
    Middle,
    /// The round that reaches or exceeds the quota. Termination policy
    /// applies.
    Last,
}

impl Phase {
    /// Pure, total classification from round counters. Called once per
    /// request; never consults anything but its arguments.
    pub fn classify(user_turn_count: usize, total_history_len: usize, target_turns: usize) -> Self {
        if total_history_len == 0 {
            Phase::First
        } else if user_turn_count >= target_turns {
            Phase::Last
        } else {
            Phase::Middle
        }
    }

    pub fn is_last(self) -> bool {
        self == Phase::Last
    }
}
