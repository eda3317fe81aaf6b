use serde::{Deserialize, Serialize};

use crate::ledger::Role;

/// One of the two fixed synthesis voices. Selection is a pure function of
/// speaker role: the persona gets voice B, anything speaking for the user
/// gets voice C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProfile {
    Persona,
    Listener,
}

impl VoiceProfile {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Persona => VoiceProfile::Persona,
            Role::User => VoiceProfile::Listener,
        }
    }

    /// Voice selection for a podcast script line. Speaker labels vary with
    /// the persona name, so user/guest markers decide and the persona voice
    /// is the default.
    pub fn for_speaker(speaker: &str) -> Self {
        let lower = speaker.to_lowercase();
        let user_marker = lower == "user"
            || lower.contains("guest")
            || speaker.contains("ユーザー")
            || speaker.contains("用户")
            || speaker.contains("嘉宾")
            || speaker.contains('私');
        if user_marker {
            VoiceProfile::Listener
        } else {
            VoiceProfile::Persona
        }
    }

    pub fn voice_name(self) -> &'static str {
        match self {
            VoiceProfile::Persona => "ja-JP-Neural2-B",
            VoiceProfile::Listener => "ja-JP-Neural2-C",
        }
    }

    pub fn language_code(self) -> &'static str {
        "ja-JP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mapping_is_fixed() {
        assert_eq!(VoiceProfile::for_role(Role::Persona), VoiceProfile::Persona);
        assert_eq!(VoiceProfile::for_role(Role::User), VoiceProfile::Listener);
    }

    #[test]
    fn speaker_markers_select_listener_voice() {
        assert_eq!(VoiceProfile::for_speaker("user"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("User"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("ユーザー"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("用户"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("嘉宾"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("私"), VoiceProfile::Listener);
        assert_eq!(VoiceProfile::for_speaker("guest speaker"), VoiceProfile::Listener);
    }

    #[test]
    fn persona_names_get_persona_voice() {
        assert_eq!(VoiceProfile::for_speaker("田中先輩"), VoiceProfile::Persona);
        assert_eq!(VoiceProfile::for_speaker("店長"), VoiceProfile::Persona);
    }

    #[test]
    fn fixed_voice_names() {
        assert_eq!(VoiceProfile::Persona.voice_name(), "ja-JP-Neural2-B");
        assert_eq!(VoiceProfile::Listener.voice_name(), "ja-JP-Neural2-C");
        assert_eq!(VoiceProfile::Persona.language_code(), "ja-JP");
    }
}
