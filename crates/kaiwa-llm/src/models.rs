/// Capabilities of a known Gemini model.
#[derive(Clone, Debug)]
pub struct GeminiModelInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub context_window: usize,
    pub supports_audio_input: bool,
}

pub static GEMINI_FLASH_LATEST: GeminiModelInfo = GeminiModelInfo {
    name: "gemini-flash-latest",
    display_name: "Gemini Flash (latest)",
    context_window: 1_000_000,
    supports_audio_input: true,
};

pub static GEMINI_2_5_FLASH: GeminiModelInfo = GeminiModelInfo {
    name: "gemini-2.5-flash",
    display_name: "Gemini 2.5 Flash",
    context_window: 1_000_000,
    supports_audio_input: true,
};

pub static GEMINI_2_5_PRO: GeminiModelInfo = GeminiModelInfo {
    name: "gemini-2.5-pro",
    display_name: "Gemini 2.5 Pro",
    context_window: 1_000_000,
    supports_audio_input: true,
};

static ALL_MODELS: &[&GeminiModelInfo] = &[
    &GEMINI_FLASH_LATEST,
    &GEMINI_2_5_FLASH,
    &GEMINI_2_5_PRO,
];

pub fn find_model(name: &str) -> Option<&'static GeminiModelInfo> {
    ALL_MODELS.iter().find(|m| m.name == name).copied()
}

pub fn default_model() -> &'static GeminiModelInfo {
    &GEMINI_FLASH_LATEST
}

pub fn all_models() -> &'static [&'static GeminiModelInfo] {
    ALL_MODELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_known_models() {
        assert!(find_model("gemini-flash-latest").is_some());
        assert!(find_model("gemini-2.5-flash").is_some());
        assert!(find_model("gemini-2.5-pro").is_some());
        assert!(find_model("nonexistent").is_none());
    }

    #[test]
    fn default_is_flash_latest() {
        assert_eq!(default_model().name, "gemini-flash-latest");
    }

    #[test]
    fn all_support_audio() {
        assert!(all_models().iter().all(|m| m.supports_audio_input));
    }
}
