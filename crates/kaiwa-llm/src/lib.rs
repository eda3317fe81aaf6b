pub mod gemini;
pub mod models;
pub mod reliable;
pub mod tts;

pub mod mock;

pub use gemini::GeminiModel;
pub use reliable::{ReliableModel, RetryConfig};
pub use tts::GoogleTts;
