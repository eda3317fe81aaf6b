//! Post-conversation composition: diary summaries, the podcast episode, and
//! stitched multi-voice audio.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use kaiwa_core::errors::{CollaboratorError, TurnError};
use kaiwa_core::ledger::{ChatTurn, Role};
use kaiwa_core::provider::{GenerateRequest, GenerativeModel, SpeechSynthesizer};
use kaiwa_core::voice::VoiceProfile;

use crate::prompts::PersonaSpec;
use crate::recovery;

/// First-pass diary summary of a finished conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiarySummary {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub diary_ja: String,
    #[serde(default)]
    pub diary_zh: String,
}

/// Summary regenerated around the user's correction note.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefinedSummary {
    #[serde(rename = "refined_summary_ja", default)]
    pub refined_ja: String,
    #[serde(rename = "refined_summary_zh", default)]
    pub refined_zh: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptLine {
    pub speaker: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiaryPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_ja: String,
}

/// Podcast script plus the polished diary page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Episode {
    #[serde(default)]
    pub script: Vec<ScriptLine>,
    pub diary: DiaryPage,
}

/// Drives the composition calls. Same collaborators as the turn
/// orchestrator, different prompts and schemas.
pub struct Composer {
    model: Arc<dyn GenerativeModel>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Composer {
    pub fn new(model: Arc<dyn GenerativeModel>, speech: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { model, speech }
    }

    fn flatten(history: &[ChatTurn], persona: &PersonaSpec) -> String {
        history
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "user",
                    Role::Persona => persona.role_name.as_str(),
                };
                format!("{speaker}: {}", turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One generate call that must come back as a JSON object of type `T`.
    /// Shares the fence-strip/brace-extraction path with turn recovery.
    async fn generate_json<T: serde::de::DeserializeOwned>(
        &self,
        instruction: String,
        input: String,
    ) -> Result<T, TurnError> {
        let request = GenerateRequest::new(instruction).with_user_text(input);
        let raw = self.model.generate(&request).await?;
        let value = recovery::extract_json(&raw).ok_or(TurnError::NoJsonFound)?;
        serde_json::from_value(value).map_err(|_| TurnError::NoJsonFound)
    }

    #[instrument(skip_all, fields(turns = history.len()))]
    pub async fn summarize(
        &self,
        history: &[ChatTurn],
        persona: &PersonaSpec,
    ) -> Result<DiarySummary, TurnError> {
        let instruction = format!(
            "You are a mentor for Japanese journaling. Summarize the conversation between \
             the user and {role} into a warm first-person (私) diary entry of about 150 \
             Japanese characters, grounded in what was actually said and weaving in two or \
             three Japanese expressions the user practiced. Return JSON only: \
             {{\"title\": \"...\", \"diary_ja\": \"...\", \"diary_zh\": \"...\"}}",
            role = persona.role_name,
        );
        let input = format!("Conversation history:\n{}", Self::flatten(history, persona));
        self.generate_json(instruction, input).await
    }

    #[instrument(skip_all, fields(turns = history.len()))]
    pub async fn refine(
        &self,
        history: &[ChatTurn],
        persona: &PersonaSpec,
        correction: &str,
    ) -> Result<RefinedSummary, TurnError> {
        let instruction =
            "You are a mentor for Japanese journaling. Combine the conversation history \
             with the user's correction note into the final diary summary. The correction \
             note takes precedence over the history; polish the Japanese to sound natural \
             and keep the first person 私. Return JSON only: \
             {\"refined_summary_ja\": \"...\", \"refined_summary_zh\": \"...\"}"
                .to_string();
        let input = format!(
            "Conversation history:\n{}\n\nUser correction note:\n{}",
            Self::flatten(history, persona),
            correction,
        );
        self.generate_json(instruction, input).await
    }

    #[instrument(skip_all, fields(turns = history.len()))]
    pub async fn compose_episode(
        &self,
        history: &[ChatTurn],
        refined_summary_ja: &str,
        persona: &PersonaSpec,
    ) -> Result<Episode, TurnError> {
        let instruction = format!(
            "You write short, upbeat podcast scripts and journaling pages. From the \
             conversation and the user's diary summary, produce:\n\
             A) a spoken-style Japanese script of about 6 exchanges hosted by {role} with \
             the user as guest, conversational fillers included (ええと、なるほど), \
             weaving in one or two Japanese usage points;\n\
             B) a warm first-person (私) diary page of about 100 Japanese characters \
             consistent with the summary.\n\
             Return JSON only: {{\"script\": [{{\"speaker\": \"{role}\", \"content\": \
             \"...\"}}, {{\"speaker\": \"user\", \"content\": \"...\"}}], \"diary\": \
             {{\"title\": \"...\", \"content_ja\": \"...\"}}}}",
            role = persona.role_name,
        );
        let input = format!(
            "Conversation material:\n{}\n\nUser's diary summary:\n{}",
            Self::flatten(history, persona),
            refined_summary_ja,
        );
        self.generate_json(instruction, input).await
    }

    /// Synthesize every script line with the voice its speaker maps to and
    /// concatenate the MP3 payloads in order. Not best-effort: a partial
    /// episode is worse than a retryable error.
    #[instrument(skip_all, fields(lines = script.len()))]
    pub async fn render_script_audio(
        &self,
        script: &[ScriptLine],
    ) -> Result<Vec<u8>, CollaboratorError> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| CollaboratorError::InvalidRequest("no speech synthesizer configured".into()))?;
        if script.is_empty() {
            return Err(CollaboratorError::InvalidRequest("empty script".into()));
        }

        let mut combined = Vec::new();
        for line in script {
            let voice = VoiceProfile::for_speaker(&line.speaker);
            let bytes = speech.synthesize(&line.content, voice).await?;
            combined.extend_from_slice(&bytes);
        }
        Ok(combined)
    }
}
