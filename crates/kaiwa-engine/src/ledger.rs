//! Ledger reconciliation: produce the full ordered conversation ledger for
//! the response, surviving a stateless request/response cycle.

use kaiwa_core::ledger::{ChatTurn, LedgerEntry};
use kaiwa_core::phase::Phase;
use kaiwa_core::turn::TurnResult;

/// Merge the new turn into the append-only ledger.
///
/// Three reconstruction modes:
/// - first phase: seed entry (when a seed topic exists) + persona entry;
/// - prior ledger supplied: copy it untouched, append user + persona;
/// - no prior ledger: replay `history` minus its final element as bare
///   role/content entries, then append the enriched user + persona entries.
///
/// Entries already present in `prior` are never mutated and their enrichment
/// is never regenerated or dropped.
pub fn reconcile(
    prior: &[LedgerEntry],
    history: &[ChatTurn],
    seed_topic: &str,
    result: &TurnResult,
    phase: Phase,
) -> Vec<LedgerEntry> {
    if phase == Phase::First {
        let mut ledger = Vec::with_capacity(2);
        if !seed_topic.is_empty() {
            let normalized = if result.user_normalized.is_empty() {
                seed_topic
            } else {
                result.user_normalized.as_str()
            };
            ledger.push(LedgerEntry::user_enriched(seed_topic, seed_topic, normalized));
        }
        ledger.push(LedgerEntry::persona_from(result));
        return ledger;
    }

    let mut ledger = if prior.is_empty() {
        let replayed = history.len().saturating_sub(1);
        history[..replayed]
            .iter()
            .map(|turn| LedgerEntry::bare(turn.role, turn.content.clone()))
            .collect()
    } else {
        prior.to_vec()
    };

    if let Some(latest) = history.last() {
        ledger.push(LedgerEntry::user_enriched(
            latest.content.clone(),
            result.user_raw_transcript.clone(),
            result.user_normalized.clone(),
        ));
    }
    ledger.push(LedgerEntry::persona_from(result));
    ledger
}
