//! Termination policy: the final turn must close the conversation and must
//! not pose a new question, even when the model does not cooperate.

use kaiwa_core::turn::{TurnResult, TurnStatus};

/// Closing/question vocabulary and canonical phrases. Configuration, not
/// algorithm: marker scanning is a heuristic and personas phrasing a close
/// outside this vocabulary will be rewritten — an accepted limitation.
#[derive(Clone, Debug)]
pub struct ClosingPolicy {
    /// Canonical closing utterance appended or substituted on the last turn.
    pub closing_phrase: String,
    /// Canonical translation of the closing utterance.
    pub closing_translation: String,
    /// A closing is detected iff every group has at least one member
    /// present in the reply.
    pub closing_marker_groups: Vec<Vec<String>>,
    /// Any member present means the reply still asks something.
    pub question_markers: Vec<String>,
    /// Sentence delimiter used when truncating a reply ahead of a question.
    pub sentence_delimiter: char,
    /// Acknowledgement used when no non-interrogative sentence survives.
    pub fallback_acknowledgement: String,
    pub fallback_acknowledgement_translation: String,
}

impl Default for ClosingPolicy {
    fn default() -> Self {
        let groups = vec![
            vec!["ありがとう".to_string()],
            vec!["日記".to_string(), "一緒".to_string()],
        ];
        let questions = ["？", "?", "ですか", "どう", "何", "いつ", "どこ", "誰", "なぜ", "どのように"]
            .map(String::from)
            .to_vec();
        Self {
            closing_phrase:
                "ありがとうございます。今日は私と話してくれて、一緒に今日の日記を書きましょう。"
                    .to_string(),
            closing_translation: "谢谢你和我说这些，让我们来一起写作今天的日记吧。".to_string(),
            closing_marker_groups: groups,
            question_markers: questions,
            sentence_delimiter: '。',
            fallback_acknowledgement: "素晴らしいですね。".to_string(),
            fallback_acknowledgement_translation: "太好了。".to_string(),
        }
    }
}

impl ClosingPolicy {
    pub fn has_closing(&self, reply: &str) -> bool {
        self.closing_marker_groups
            .iter()
            .all(|group| group.iter().any(|marker| reply.contains(marker.as_str())))
    }

    pub fn has_question(&self, text: &str) -> bool {
        self.question_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    }

    /// Leading non-interrogative sentences of a reply, delimiters retained.
    /// Empty when the reply opens with a question.
    fn leading_statement(&self, reply: &str) -> String {
        let mut kept = String::new();
        for sentence in reply.split(self.sentence_delimiter) {
            if sentence.trim().is_empty() {
                continue;
            }
            if self.has_question(sentence) {
                break;
            }
            kept.push_str(sentence.trim());
            kept.push(self.sentence_delimiter);
        }
        kept
    }

    /// Apply the termination override. Identity below the quota; at or past
    /// it, the decision table runs against the *original* reply and the
    /// status is forced to FINISHED unconditionally.
    pub fn enforce(&self, result: TurnResult, round_index: usize, target_turns: usize) -> TurnResult {
        if round_index < target_turns {
            return result;
        }

        let mut out = result;
        out.status = TurnStatus::Finished;

        let original = out.reply.clone();
        let closing = self.has_closing(&original);
        let question = self.has_question(&original);

        if closing && !question {
            return out;
        }

        if question {
            let lead = self.leading_statement(&original);
            let lead = if lead.trim().is_empty() {
                self.fallback_acknowledgement.clone()
            } else {
                lead
            };
            out.reply = format!("{} {}", lead.trim(), self.closing_phrase);
            // Any translated question content is discarded along with the
            // question itself; the pair below is the canonical rendering.
            out.translation = format!(
                "{} {}",
                self.fallback_acknowledgement_translation, self.closing_translation
            );
            return out;
        }

        if original.is_empty() {
            out.reply = self.closing_phrase.clone();
            out.translation = self.closing_translation.clone();
        } else {
            out.reply = format!("{} {}", original, self.closing_phrase);
            out.translation = if out.translation.is_empty() {
                self.closing_translation.clone()
            } else {
                format!("{} {}", out.translation, self.closing_translation)
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(reply: &str, translation: &str) -> TurnResult {
        TurnResult {
            user_raw_transcript: "転職の話".into(),
            user_normalized: "転職の話".into(),
            reply: reply.into(),
            translation: translation.into(),
            suggestion: None,
            status: TurnStatus::Continue,
        }
    }

    #[test]
    fn identity_below_quota() {
        let policy = ClosingPolicy::default();
        let input = turn("それで、どう思った？", "那么，你怎么想？");
        let out = policy.enforce(input.clone(), 3, 6);
        assert_eq!(out.reply, input.reply);
        assert_eq!(out.status, TurnStatus::Continue);
    }

    #[test]
    fn status_forced_even_when_reply_kept() {
        let policy = ClosingPolicy::default();
        let reply = "ありがとうございます。今日は私と話してくれて、一緒に今日の日記を書きましょう。";
        let out = policy.enforce(turn(reply, "谢谢。"), 6, 6);
        assert_eq!(out.status, TurnStatus::Finished);
        assert_eq!(out.reply, reply);
        assert_eq!(out.translation, "谢谢。");
    }

    #[test]
    fn question_stripped_and_closing_appended() {
        let policy = ClosingPolicy::default();
        let out = policy.enforce(
            turn("今日は大変だったね。明日はどうするの？", "今天辛苦了。明天打算怎么办？"),
            6,
            6,
        );
        assert_eq!(out.status, TurnStatus::Finished);
        assert!(out.reply.starts_with("今日は大変だったね。"));
        assert!(out.reply.contains(&policy.closing_phrase));
        assert!(!policy.has_question(&out.reply));
        assert_eq!(
            out.translation,
            format!("{} {}", policy.fallback_acknowledgement_translation, policy.closing_translation)
        );
    }

    #[test]
    fn reply_opening_with_question_falls_back_to_acknowledgement() {
        let policy = ClosingPolicy::default();
        let out = policy.enforce(turn("明日はどこに行くの？", "明天去哪里？"), 6, 6);
        assert!(out.reply.starts_with(&policy.fallback_acknowledgement));
        assert!(out.reply.contains(&policy.closing_phrase));
        assert!(!policy.has_question(&out.reply));
    }

    #[test]
    fn closing_appended_when_neither_marker_present() {
        let policy = ClosingPolicy::default();
        let out = policy.enforce(turn("今日も頑張ったね。", "今天也很努力了。"), 6, 6);
        assert_eq!(
            out.reply,
            format!("今日も頑張ったね。 {}", policy.closing_phrase)
        );
        assert_eq!(
            out.translation,
            format!("今天也很努力了。 {}", policy.closing_translation)
        );
        assert_eq!(out.status, TurnStatus::Finished);
    }

    #[test]
    fn empty_reply_becomes_bare_closing() {
        let policy = ClosingPolicy::default();
        let out = policy.enforce(turn("", ""), 7, 6);
        assert_eq!(out.reply, policy.closing_phrase);
        assert_eq!(out.translation, policy.closing_translation);
    }

    #[test]
    fn closing_with_question_still_rewritten() {
        // A closing phrase followed by one more question must not survive.
        let policy = ClosingPolicy::default();
        let out = policy.enforce(
            turn(
                "ありがとう、一緒に日記を書きましょう。あ、最後に何があった？",
                "谢谢，一起写日记吧。对了，最后发生了什么？",
            ),
            6,
            6,
        );
        assert!(!policy.has_question(&out.reply));
        assert!(out.reply.contains(&policy.closing_phrase));
    }

    #[test]
    fn enforced_reply_always_satisfies_invariant() {
        let policy = ClosingPolicy::default();
        for reply in [
            "",
            "今日も頑張ったね。",
            "明日はどうするの？",
            "頑張ったね。で、何が一番大変だった？",
            "ありがとうございます。一緒に日記を書きましょう。",
        ] {
            let out = policy.enforce(turn(reply, "x"), 6, 6);
            assert!(policy.has_closing(&out.reply), "reply: {reply}");
            assert!(!policy.has_question(&out.reply), "reply: {reply}");
            assert_eq!(out.status, TurnStatus::Finished);
        }
    }

    #[test]
    fn marker_groups_are_conjunctive() {
        let policy = ClosingPolicy::default();
        // Gratitude alone is not a closing.
        assert!(!policy.has_closing("ありがとうございました。"));
        // Topic alone is not a closing either.
        assert!(!policy.has_closing("日記を書きましょう。"));
        assert!(policy.has_closing("ありがとう。日記を書きましょう。"));
        assert!(policy.has_closing("ありがとう。一緒に書きましょう。"));
    }
}
