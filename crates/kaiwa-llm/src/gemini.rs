use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use kaiwa_core::errors::CollaboratorError;
use kaiwa_core::ledger::Role;
use kaiwa_core::provider::{GenerateRequest, GenerativeModel};

use crate::models::{self, GeminiModelInfo};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini `generateContent` client. Non-streaming: a turn is one request,
/// one JSON body back.
pub struct GeminiModel {
    client: Client,
    api_key: SecretString,
    model_info: &'static GeminiModelInfo,
}

impl GeminiModel {
    pub fn new(api_key: SecretString, model_name: Option<&str>) -> Self {
        let model_info = model_name
            .and_then(models::find_model)
            .unwrap_or_else(models::default_model);

        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            model_info,
        }
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/models/{}:generateContent", self.model_info.name)
    }
}

/// Build the `generateContent` request body. Prior turns become `contents`
/// entries; the latest user input is one final `user` entry carrying the
/// audio attachment (if any) before the text part.
pub(crate) fn build_request_body(request: &GenerateRequest) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Persona => "model",
            };
            serde_json::json!({
                "role": role,
                "parts": [{"text": turn.content}],
            })
        })
        .collect();

    let mut latest_parts: Vec<serde_json::Value> = Vec::new();
    if let Some(attachment) = &request.attachment {
        latest_parts.push(serde_json::json!({
            "inline_data": {
                "mime_type": attachment.mime_type,
                "data": attachment.data_base64,
            }
        }));
    }
    if let Some(text) = &request.user_text {
        latest_parts.push(serde_json::json!({"text": text}));
    }
    if !latest_parts.is_empty() {
        contents.push(serde_json::json!({"role": "user", "parts": latest_parts}));
    }

    let mut body = serde_json::json!({
        "system_instruction": {"parts": [{"text": request.system_instruction}]},
        "contents": contents,
    });
    if request.json_output {
        body["generationConfig"] = serde_json::json!({"response_mime_type": "application/json"});
    }
    body
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Concatenate all text parts of the first candidate. Blocked or empty
/// candidates come back as `EmptyOutput`, not a panic deep in field access.
pub(crate) fn extract_text(response: GenerateContentResponse) -> Result<String, CollaboratorError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(CollaboratorError::EmptyOutput);
    }
    Ok(text)
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        self.model_info.name
    }

    #[instrument(skip(self, request), fields(model = %self.model_info.name))]
    async fn generate(&self, request: &GenerateRequest) -> Result<String, CollaboratorError> {
        let body = build_request_body(request);

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(status, body));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::NetworkError(format!("malformed response: {e}")))?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaiwa_core::ledger::ChatTurn;
    use kaiwa_core::provider::AudioAttachment;

    #[test]
    fn body_maps_history_roles() {
        let request = GenerateRequest::new("be the persona")
            .with_history(vec![
                ChatTurn::persona("今日はどうだった？"),
                ChatTurn::user("忙しかったよ"),
            ])
            .with_user_text("えっと、棚の整理をして");
        let body = build_request_body(&request);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "えっと、棚の整理をして");
        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "be the persona"
        );
        assert_eq!(
            body["generationConfig"]["response_mime_type"],
            "application/json"
        );
    }

    #[test]
    fn attachment_precedes_text_in_latest_parts() {
        let request = GenerateRequest::new("instruction")
            .with_attachment(AudioAttachment {
                data_base64: "QUJD".into(),
                mime_type: "audio/webm".into(),
            })
            .with_user_text("context for the audio");
        let body = build_request_body(&request);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inline_data"]["mime_type"], "audio/webm");
        assert_eq!(parts[0]["inline_data"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], "context for the audio");
    }

    #[test]
    fn no_latest_input_appends_nothing() {
        let request = GenerateRequest::new("instruction")
            .with_history(vec![ChatTurn::user("こんにちは")]);
        let body = build_request_body(&request);
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn extract_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"reply\":"}, {"text": "\"はい\"}"}]}
            }]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "{\"reply\":\"はい\"}");
    }

    #[test]
    fn empty_candidates_is_empty_output() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"candidates": []})).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(CollaboratorError::EmptyOutput)
        ));
    }

    #[test]
    fn blocked_candidate_without_content_is_empty_output() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"candidates": [{}]})).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(CollaboratorError::EmptyOutput)
        ));
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        let model = GeminiModel::new(SecretString::from("test-key".to_string()), Some("not-a-model"));
        assert_eq!(model.model(), "gemini-flash-latest");
        assert!(model.endpoint().ends_with("models/gemini-flash-latest:generateContent"));
    }
}
