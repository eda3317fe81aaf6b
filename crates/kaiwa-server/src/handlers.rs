//! Request/response DTOs and route handlers. Legacy camelCase field names
//! from the original browser client are accepted via serde aliases.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::error;

use kaiwa_core::errors::{CollaboratorError, TurnError};
use kaiwa_core::ledger::{ChatTurn, LedgerEntry, Role};
use kaiwa_core::phase::Phase;
use kaiwa_core::provider::AudioAttachment;
use kaiwa_core::turn::TurnStatus;
use kaiwa_core::voice::VoiceProfile;
use kaiwa_engine::{Composer, PersonaSpec, ScriptLine, Tone, TurnOrchestrator, TurnOutcome, TurnRequest};

/// Shared state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub composer: Arc<Composer>,
    pub speech: Option<Arc<dyn kaiwa_core::provider::SpeechSynthesizer>>,
    pub model_name: String,
}

fn default_turns() -> usize {
    6
}

fn default_audio_mime() -> String {
    "audio/webm".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "context")]
    pub seed_topic: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, alias = "mentorRole")]
    pub persona_role: String,
    #[serde(default = "default_turns", alias = "turn")]
    pub target_turns: usize,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(
        default,
        alias = "previous_communication_raw",
        alias = "previousCommunicationRaw"
    )]
    pub prior_ledger: Vec<LedgerEntry>,
    #[serde(default, alias = "audioBase64")]
    pub audio_base64: String,
    #[serde(default = "default_audio_mime", alias = "audioMimeType")]
    pub audio_mime_type: String,
}

impl ChatRequest {
    fn into_turn_request(self) -> TurnRequest {
        let audio = if self.audio_base64.is_empty() {
            None
        } else {
            Some(AudioAttachment {
                data_base64: self.audio_base64,
                mime_type: self.audio_mime_type,
            })
        };
        TurnRequest {
            seed_topic: self.seed_topic,
            tone: self.tone,
            persona_role: self.persona_role,
            target_turns: self.target_turns,
            history: self.history,
            prior_ledger: self.prior_ledger,
            audio,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub translation: String,
    pub suggestion: Option<String>,
    pub status: TurnStatus,
    pub user_raw_transcript: String,
    pub user_normalized: String,
    pub phase: Phase,
    pub round_index: usize,
    pub ledger: Vec<LedgerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            reply: outcome.result.reply,
            translation: outcome.result.translation,
            suggestion: outcome.result.suggestion,
            status: outcome.result.status,
            user_raw_transcript: outcome.result.user_raw_transcript,
            user_normalized: outcome.result.user_normalized,
            phase: outcome.phase,
            round_index: outcome.round_index,
            ledger: outcome.ledger,
            reply_audio: outcome.audio_base64,
            tts_error: outcome.tts_error,
            error: outcome.error_kind,
        }
    }
}

/// POST /api/chat — run one dialogue turn.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let turn_request = request.into_turn_request();
    match state.orchestrator.run_turn(&turn_request).await {
        Ok(outcome) => (StatusCode::OK, Json(ChatResponse::from(outcome))).into_response(),
        Err(e) => contract_violation(e),
    }
}

/// Caller contract violations become a 400 carrying only the kind label.
fn contract_violation(error: TurnError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": error.error_kind()})),
    )
        .into_response()
}

/// Composition failures stay a 200 with a category label; internals are
/// logged, never returned.
fn composition_error(error: TurnError) -> Response {
    error!(kind = error.error_kind(), "composition call failed");
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ERROR", "error": error.error_kind()})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, alias = "mentorRole")]
    pub persona_role: String,
}

impl SummarizeRequest {
    fn persona(&self) -> PersonaSpec {
        PersonaSpec {
            role_name: self.persona_role.clone(),
            tone: self.tone,
            seed_topic: String::new(),
        }
    }
}

/// POST /api/summarize — first-pass diary summary of the conversation.
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    match state
        .composer
        .summarize(&request.history, &request.persona())
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => composition_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, alias = "mentorRole")]
    pub persona_role: String,
    #[serde(alias = "correction_summary", alias = "correctionSummary")]
    pub correction: String,
}

/// POST /api/refine — regenerate the summary around the user's correction.
pub async fn refine(State(state): State<AppState>, Json(request): Json<RefineRequest>) -> Response {
    let persona = PersonaSpec {
        role_name: request.persona_role.clone(),
        tone: request.tone,
        seed_topic: String::new(),
    };
    match state
        .composer
        .refine(&request.history, &persona, &request.correction)
        .await
    {
        Ok(refined) => (StatusCode::OK, Json(refined)).into_response(),
        Err(e) => composition_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    /// Accepts a full ledger: entries carry role/content plus enrichment,
    /// and the enrichment is simply ignored here.
    #[serde(default, alias = "communication_raw", alias = "communicationRaw")]
    pub history: Vec<ChatTurn>,
    #[serde(default, alias = "refined_summary_ja", alias = "refinedSummaryJa")]
    pub refined_summary: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, alias = "mentorRole")]
    pub persona_role: String,
}

/// POST /api/compose — podcast script + polished diary page.
pub async fn compose(State(state): State<AppState>, Json(request): Json<ComposeRequest>) -> Response {
    let persona = PersonaSpec {
        role_name: request.persona_role.clone(),
        tone: request.tone,
        seed_topic: String::new(),
    };
    match state
        .composer
        .compose_episode(&request.history, &request.refined_summary, &persona)
        .await
    {
        Ok(episode) => (StatusCode::OK, Json(episode)).into_response(),
        Err(e) => composition_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct PodcastAudioRequest {
    pub script: Vec<ScriptLine>,
}

/// POST /api/podcast_audio — stitch the whole script into one MP3.
pub async fn podcast_audio(
    State(state): State<AppState>,
    Json(request): Json<PodcastAudioRequest>,
) -> Response {
    match state.composer.render_script_audio(&request.script).await {
        Ok(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "SUCCESS",
                    "audio_base64": encoded,
                    "total_lines": request.script.len(),
                })),
            )
                .into_response()
        }
        Err(e) => composition_error(TurnError::Collaborator(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_speaker")]
    pub speaker: Role,
}

fn default_speaker() -> Role {
    Role::Persona
}

/// POST /api/tts — synthesize one utterance with the role's fixed voice.
pub async fn tts(State(state): State<AppState>, Json(request): Json<TtsRequest>) -> Response {
    let Some(speech) = &state.speech else {
        return composition_error(TurnError::Collaborator(CollaboratorError::InvalidRequest(
            "no speech synthesizer configured".into(),
        )));
    };
    match speech
        .synthesize(&request.text, VoiceProfile::for_role(request.speaker))
        .await
    {
        Ok(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            (
                StatusCode::OK,
                Json(serde_json::json!({"audio_base64": encoded})),
            )
                .into_response()
        }
        Err(e) => composition_error(TurnError::Collaborator(e)),
    }
}

/// GET /health — liveness and the configured model id.
pub async fn health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "healthy", "model": state.model_name})),
    )
        .into_response()
}
