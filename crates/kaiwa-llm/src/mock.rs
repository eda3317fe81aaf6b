use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use kaiwa_core::errors::CollaboratorError;
use kaiwa_core::provider::{GenerateRequest, GenerativeModel, SpeechSynthesizer};
use kaiwa_core::voice::VoiceProfile;

/// Pre-programmed generate outcomes for deterministic testing without API
/// calls.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Error(CollaboratorError),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Mock generative model that returns pre-programmed replies in sequence
/// and records every request it receives.
pub struct MockModel {
    replies: Vec<MockReply>,
    requests: Mutex<Vec<GenerateRequest>>,
    call_count: AtomicUsize,
}

impl MockModel {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Single canned text reply.
    pub fn single(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::text(text)])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().push(request.clone());
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        match self.replies.get(idx) {
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Error(e)) => Err(e.clone()),
            None => Err(CollaboratorError::InvalidRequest(format!(
                "MockModel: no reply configured for call {idx}"
            ))),
        }
    }
}

/// Mock speech synthesizer with one fixed outcome for every call.
pub struct MockSpeech {
    outcome: Result<Vec<u8>, CollaboratorError>,
    calls: Mutex<Vec<(String, VoiceProfile)>>,
}

impl MockSpeech {
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self {
            outcome: Ok(bytes),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            outcome: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, VoiceProfile)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    fn name(&self) -> &str {
        "mock-speech"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: VoiceProfile,
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.calls.lock().push((text.to_string(), voice));
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_replies() {
        let mock = MockModel::new(vec![
            MockReply::text("first"),
            MockReply::text("second"),
        ]);
        let req = GenerateRequest::new("sys");

        assert_eq!(mock.generate(&req).await.unwrap(), "first");
        assert_eq!(mock.generate(&req).await.unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_replies_error() {
        let mock = MockModel::single("only one");
        let req = GenerateRequest::new("sys");

        let _ = mock.generate(&req).await;
        assert!(mock.generate(&req).await.is_err());
    }

    #[tokio::test]
    async fn error_reply_propagates() {
        let mock = MockModel::new(vec![MockReply::Error(CollaboratorError::Overloaded)]);
        let req = GenerateRequest::new("sys");
        assert!(matches!(
            mock.generate(&req).await,
            Err(CollaboratorError::Overloaded)
        ));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let mock = MockModel::single("ok");
        let req = GenerateRequest::new("the instruction").with_user_text("hello");
        let _ = mock.generate(&req).await;

        let seen = mock.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].system_instruction, "the instruction");
        assert_eq!(seen[0].user_text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn speech_records_voice() {
        let speech = MockSpeech::ok(vec![1, 2, 3]);
        let bytes = speech.synthesize("はい", VoiceProfile::Persona).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(speech.calls()[0].1, VoiceProfile::Persona);
    }

    #[tokio::test]
    async fn speech_failure() {
        let speech = MockSpeech::failing(CollaboratorError::EmptyOutput);
        assert!(speech.synthesize("はい", VoiceProfile::Listener).await.is_err());
    }
}
