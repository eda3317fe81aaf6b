use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use kaiwa_core::provider::{GenerativeModel, SpeechSynthesizer};
use kaiwa_engine::{Composer, TurnOrchestrator};
use kaiwa_llm::{GeminiModel, GoogleTts, ReliableModel};
use kaiwa_server::{AppState, ServerConfig};
use kaiwa_telemetry::TelemetryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = kaiwa_telemetry::init_telemetry(TelemetryConfig::default());

    tracing::info!("starting kaiwa server");

    let gemini_key = std::env::var("KAIWA_GEMINI_API_KEY")
        .context("KAIWA_GEMINI_API_KEY is not set")?;
    let model_name = std::env::var("KAIWA_MODEL").ok();

    let gemini = GeminiModel::new(SecretString::from(gemini_key), model_name.as_deref());
    let model: Arc<dyn GenerativeModel> = Arc::new(ReliableModel::with_defaults(gemini));
    let model_name = model.model().to_string();

    // Speech is a best-effort enrichment: without a key the server still
    // answers turns, just without audio.
    let speech: Option<Arc<dyn SpeechSynthesizer>> = match std::env::var("KAIWA_TTS_API_KEY") {
        Ok(key) => Some(Arc::new(GoogleTts::new(SecretString::from(key)))),
        Err(_) => {
            tracing::warn!("KAIWA_TTS_API_KEY not set; reply audio disabled");
            None
        }
    };

    let state = AppState {
        orchestrator: Arc::new(TurnOrchestrator::new(model.clone(), speech.clone())),
        composer: Arc::new(Composer::new(model, speech.clone())),
        speech,
        model_name,
    };

    let port = std::env::var("KAIWA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| ServerConfig::default().port);

    let handle = kaiwa_server::start(ServerConfig { port }, state)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "kaiwa server ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    Ok(())
}
