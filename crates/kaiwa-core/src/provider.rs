use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;
use crate::ledger::ChatTurn;
use crate::voice::VoiceProfile;

/// A spoken user turn forwarded inline to the generative model, which does
/// its own transcription.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioAttachment {
    pub data_base64: String,
    pub mime_type: String,
}

/// One generate call: a phase-specific system instruction, prior turns, and
/// the latest user input as text and/or audio.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub user_text: Option<String>,
    pub attachment: Option<AudioAttachment>,
    /// Ask the model for a raw JSON object (no prose, no fences). The
    /// recovery cascade still assumes it may not comply.
    pub json_output: bool,
}

impl GenerateRequest {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
            user_text: None,
            attachment: None,
            json_output: true,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_user_text(mut self, text: impl Into<String>) -> Self {
        self.user_text = Some(text.into());
        self
    }

    pub fn with_attachment(mut self, attachment: AudioAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Opaque generative text model collaborator. May fail with a transport or
/// empty-output error like any other collaborator call.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError>;
}

/// Best-effort speech synthesis collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        text: &str,
        voice: VoiceProfile,
    ) -> Result<Vec<u8>, CollaboratorError>;
}
