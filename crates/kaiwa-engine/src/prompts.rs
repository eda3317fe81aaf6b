//! Persona instruction builders, one per phase. Wording is a content
//! concern; the orchestrator only decides which builder runs.

use serde::{Deserialize, Serialize};

use kaiwa_core::phase::Phase;

/// Speech register the persona keeps for the whole session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Gentle,
    Normal,
    Serious,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Normal
    }
}

impl Tone {
    pub fn register(self) -> &'static str {
        match self {
            Tone::Gentle => {
                "casual, warm and encouraging Japanese (タメ口 is fine): friendly sentence \
                 endings like 「〜だね」「〜よ」「〜でしょ」, the way a close friend talks"
            }
            Tone::Normal => {
                "natural です/ます politeness: courteous but relaxed, the way colleagues or \
                 acquaintances talk"
            }
            Tone::Serious => {
                "full formal keigo throughout: です/ます as the base with 尊敬語 and 謙譲語 \
                 (いらっしゃる、おっしゃる、申す、いたす), endings like 「〜でございます」\
                 「〜いたします」; casual forms are forbidden"
            }
        }
    }
}

/// Who the model is playing and around what topic.
#[derive(Clone, Debug)]
pub struct PersonaSpec {
    pub role_name: String,
    pub tone: Tone,
    pub seed_topic: String,
}

impl PersonaSpec {
    fn topic(&self) -> &str {
        if self.seed_topic.is_empty() {
            "(no seed topic given)"
        } else {
            &self.seed_topic
        }
    }
}

const OUTPUT_CONTRACT: &str = r#"Output a single JSON object and nothing else:
{
  "user_raw_transcript": "verbatim transcription of the user's latest input — Chinese stays Chinese, Japanese stays Japanese, fillers (えっと、あの、那个、嗯) stay in; never translate or tidy",
  "user_normalized": "the user's intent restated as natural Japanese",
  "reply": "your utterance, Japanese only, first person, in character",
  "translation": "Simplified-Chinese translation of reply — must not be Japanese and must not repeat reply",
  "suggestion": "one short coaching note on the user's Japanese, or null",
  "status": "CONTINUE or FINISHED"
}"#;

fn role_header(persona: &PersonaSpec) -> String {
    format!(
        "You ARE {role} — not an AI, not a narrator, not a third party. Speak in the first \
         person (私/僕/俺) for the entire conversation and never refer to yourself as \
         \"{role}\" from the outside. Register: {register}.",
        role = persona.role_name,
        register = persona.tone.register(),
    )
}

/// System instruction for the given phase.
pub fn system_instruction(
    persona: &PersonaSpec,
    phase: Phase,
    round_index: usize,
    target_turns: usize,
) -> String {
    match phase {
        Phase::First => format!(
            "{header}\n\n\
             The user just shared their seed topic: {topic}\n\
             This is the opening turn: respond with one or two empathetic sentences about \
             the topic, then ask exactly one 5W1H question (who/when/where/what/why/how) \
             to help the user explore it. Set user_raw_transcript to the seed topic \
             verbatim and user_normalized to its natural Japanese rendering. \
             Set status to \"CONTINUE\".\n\n{contract}",
            header = role_header(persona),
            topic = persona.topic(),
            contract = OUTPUT_CONTRACT,
        ),
        Phase::Middle => format!(
            "{header}\n\n\
             Seed topic of the whole conversation: {topic}\n\
             The user's latest input may be fragmented, bilingual speech. Transcribe it \
             verbatim into user_raw_transcript (keep the language mix and the fillers), \
             and restate the intent as Japanese in user_normalized. Respond in character \
             with empathy, then ask exactly one 5W1H follow-up question that stays on the \
             seed topic. Put one concrete note on pronunciation, conjugation or phrasing \
             in suggestion. This is round {round} of {target}; set status to \"CONTINUE\".\n\n\
             {contract}",
            header = role_header(persona),
            topic = persona.topic(),
            round = round_index,
            target = target_turns,
            contract = OUTPUT_CONTRACT,
        ),
        Phase::Last => format!(
            "{header}\n\n\
             Seed topic of the whole conversation: {topic}\n\
             This is round {round} and the session limit of {target} rounds is reached. \
             Transcribe the user's latest input verbatim into user_raw_transcript as \
             before. Respond with one or two empathetic sentences, then close the \
             conversation with: \
             ありがとうございます。今日は私と話してくれて、一緒に今日の日記を書きましょう。 \
             Do NOT ask any question. Set status to \"FINISHED\".\n\n{contract}",
            header = role_header(persona),
            topic = persona.topic(),
            round = round_index,
            target = target_turns,
            contract = OUTPUT_CONTRACT,
        ),
    }
}

/// User-side prompt for the opening turn, where there is no utterance yet.
pub fn first_turn_prompt(seed_topic: &str) -> String {
    let topic = if seed_topic.is_empty() {
        "(no seed topic given)"
    } else {
        seed_topic
    };
    format!(
        "The user shared this topic: {topic}. Open the conversation in Japanese with your \
         first question about it."
    )
}

/// Note attached alongside an inline audio part: the model transcribes the
/// audio itself, so the text part only frames it.
pub const AUDIO_TURN_NOTE: &str =
    "The attached audio is the user's latest utterance. Transcribe it verbatim into \
     user_raw_transcript (keep every language and filler as spoken), then answer per the \
     system instruction.";
