pub mod errors;
pub mod ledger;
pub mod phase;
pub mod provider;
pub mod turn;
pub mod voice;

pub use errors::{CollaboratorError, TurnError};
pub use ledger::{ChatTurn, LedgerEntry, Role};
pub use phase::Phase;
pub use provider::{AudioAttachment, GenerateRequest, GenerativeModel, SpeechSynthesizer};
pub use turn::{TurnResult, TurnStatus};
pub use voice::VoiceProfile;
