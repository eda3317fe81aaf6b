pub mod composer;
pub mod ledger;
pub mod orchestrator;
pub mod prompts;
pub mod recovery;
pub mod termination;

pub use composer::{Composer, DiaryPage, DiarySummary, Episode, RefinedSummary, ScriptLine};
pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnRequest};
pub use prompts::{PersonaSpec, Tone};
pub use recovery::{Recovered, RecoveryStrategy};
pub use termination::ClosingPolicy;
