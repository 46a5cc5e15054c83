//! Summarization prompt.

use mnemo_core::{ConversationSummary, Message};

const INSTRUCTIONS: &str = "You maintain the running memory of a conversation between a user \
and an assistant. Summarize the transcript below in a few sentences. Keep facts, decisions, \
open questions, user preferences and named entities. Write in the third person and do not \
invent anything that is not in the transcript. Reply with the summary only.";

/// Render messages as `role: content`, one per line.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt parts for summarizing `messages`.
///
/// The transcript is always the last part.
pub fn summary_prompt(previous: Option<&ConversationSummary>, messages: &[Message]) -> Vec<String> {
    let mut parts = vec![INSTRUCTIONS.to_string()];
    if let Some(previous) = previous {
        parts.push(format!(
            "Summary of the conversation so far, for context only:\n{}",
            previous.content
        ));
    }
    parts.push(render_transcript(messages));
    parts
}
