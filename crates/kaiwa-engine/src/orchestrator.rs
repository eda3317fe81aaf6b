//! The per-request driver: classify → generate → recover → enforce →
//! reconcile → best-effort speech, packaged as one well-formed outcome.

use std::sync::Arc;

use base64::Engine;
use tracing::{info, warn};
use uuid::Uuid;

use kaiwa_core::errors::TurnError;
use kaiwa_core::ledger::{user_turn_count, ChatTurn, LedgerEntry};
use kaiwa_core::phase::Phase;
use kaiwa_core::provider::{AudioAttachment, GenerateRequest, GenerativeModel, SpeechSynthesizer};
use kaiwa_core::turn::TurnResult;
use kaiwa_core::voice::VoiceProfile;

use crate::ledger::reconcile;
use crate::prompts::{self, PersonaSpec, Tone};
use crate::recovery;
use crate::termination::ClosingPolicy;

/// Everything a turn needs arrives with the request; nothing is kept
/// server-side between requests.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub seed_topic: String,
    pub tone: Tone,
    pub persona_role: String,
    pub target_turns: usize,
    pub history: Vec<ChatTurn>,
    pub prior_ledger: Vec<LedgerEntry>,
    pub audio: Option<AudioAttachment>,
}

/// The packaged response for one turn. Always well-formed: failures show up
/// as an ERROR result plus a category label, never as a raw error.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub result: TurnResult,
    pub ledger: Vec<LedgerEntry>,
    pub phase: Phase,
    pub round_index: usize,
    /// Base64 MP3 of the persona reply, when synthesis succeeded.
    pub audio_base64: Option<String>,
    /// Diagnostic when synthesis was attempted and failed. Best-effort:
    /// never an error status.
    pub tts_error: Option<String>,
    /// Category label set on degraded (ERROR) outcomes.
    pub error_kind: Option<&'static str>,
}

pub struct TurnOrchestrator {
    model: Arc<dyn GenerativeModel>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    policy: ClosingPolicy,
}

impl TurnOrchestrator {
    pub fn new(model: Arc<dyn GenerativeModel>, speech: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self {
            model,
            speech,
            policy: ClosingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ClosingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one dialogue turn.
    ///
    /// Only a caller contract violation surfaces as `Err`; collaborator and
    /// recovery failures degrade to an ERROR outcome with an apology reply
    /// and an empty ledger, so the caller can always serialize a response.
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnOutcome, TurnError> {
        let round_index = user_turn_count(&request.history);
        let phase = Phase::classify(round_index, request.history.len(), request.target_turns);
        let turn_id = Uuid::now_v7();

        // A continuing conversation (prior ledger present) with no history
        // cannot carry a latest turn: malformed request, reject up front.
        if request.history.is_empty() && !request.prior_ledger.is_empty() {
            return Err(TurnError::EmptyHistory);
        }

        let persona = PersonaSpec {
            role_name: request.persona_role.clone(),
            tone: request.tone,
            seed_topic: request.seed_topic.clone(),
        };

        let generate_request = match self.build_generate_request(request, &persona, phase, round_index) {
            Ok(req) => req,
            Err(e) => return self.degrade(request, e, phase, round_index),
        };

        let raw = match self.model.generate(&generate_request).await {
            Ok(raw) => raw,
            Err(e) => return self.degrade(request, e.into(), phase, round_index),
        };

        let recovered = match recovery::recover(&raw) {
            Ok(recovered) => recovered,
            Err(e) => return self.degrade(request, e, phase, round_index),
        };
        info!(
            turn_id = %turn_id,
            phase = ?phase,
            strategy = recovered.strategy.as_str(),
            "turn recovered"
        );

        let mut result = recovered.result;
        if phase.is_last() {
            result = self.policy.enforce(result, round_index, request.target_turns);
        }

        let ledger = reconcile(
            &request.prior_ledger,
            &request.history,
            &request.seed_topic,
            &result,
            phase,
        );

        let (audio_base64, tts_error) = self.synthesize_reply(&result.reply).await;

        Ok(TurnOutcome {
            result,
            ledger,
            phase,
            round_index,
            audio_base64,
            tts_error,
            error_kind: None,
        })
    }

    fn build_generate_request(
        &self,
        request: &TurnRequest,
        persona: &PersonaSpec,
        phase: Phase,
        round_index: usize,
    ) -> Result<GenerateRequest, TurnError> {
        let instruction = prompts::system_instruction(persona, phase, round_index, request.target_turns);

        if phase == Phase::First {
            return Ok(GenerateRequest::new(instruction)
                .with_user_text(prompts::first_turn_prompt(&request.seed_topic)));
        }

        let (prior_turns, latest) = match request.history.split_last() {
            Some((latest, prior)) => (prior, latest),
            None => return Err(TurnError::EmptyHistory),
        };

        let mut generate_request =
            GenerateRequest::new(instruction).with_history(prior_turns.to_vec());
        generate_request = match &request.audio {
            Some(attachment) => generate_request
                .with_attachment(attachment.clone())
                .with_user_text(prompts::AUDIO_TURN_NOTE),
            None => generate_request.with_user_text(latest.content.clone()),
        };
        Ok(generate_request)
    }

    /// Substitute the user-facing fallback turn. Raw model text and error
    /// details never reach the caller; only the kind label does.
    fn degrade(
        &self,
        request: &TurnRequest,
        error: TurnError,
        phase: Phase,
        round_index: usize,
    ) -> Result<TurnOutcome, TurnError> {
        if !error.is_degradable() {
            return Err(error);
        }
        warn!(kind = error.error_kind(), phase = ?phase, "turn degraded to error outcome");

        let reply = format!(
            "ごめんなさい、{}は今うまく答えられないみたいです。少し待ってもう一度話しかけてください。",
            request.persona_role
        );
        let translation = "抱歉，我现在无法回复，请稍后再试。".to_string();

        Ok(TurnOutcome {
            result: TurnResult::error_turn(reply, translation),
            ledger: Vec::new(),
            phase,
            round_index,
            audio_base64: None,
            tts_error: None,
            error_kind: Some(error.error_kind()),
        })
    }

    async fn synthesize_reply(&self, reply: &str) -> (Option<String>, Option<String>) {
        let Some(speech) = &self.speech else {
            return (None, None);
        };
        if reply.is_empty() {
            return (None, None);
        }

        match speech.synthesize(reply, VoiceProfile::Persona).await {
            Ok(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                (Some(encoded), None)
            }
            Err(e) => {
                warn!(kind = e.error_kind(), "reply synthesis failed, continuing without audio");
                (None, Some(format!("speech synthesis unavailable ({})", e.error_kind())))
            }
        }
    }
}
