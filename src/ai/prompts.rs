//! Prompt construction for digest generation

use crate::digest::aggregate::Conversation;

/// Build the single digest prompt for one conversation. The model is asked
/// for a JSON object with exactly three top-level fields; anything else it
/// says is handled by the salvage parser downstream.
pub fn digest_prompt(conversation: &Conversation) -> String {
    format!(
        "You are an executive assistant creating an email digest entry.\n\
         Given the email thread, produce a JSON object with: \n\
         - summary: 2–4 sentences summarizing the thread (professional, concise).\n\
         - action: one clear suggested action for the user.\n\
         - replies: an array with up to 3 objects, each with: \n\
         \x20 - label: a single-word lowercase label suitable for a button (e.g., 'confirm', 'decline', 'schedule').\n\
         \x20 - body: the full email reply text in first person, no quotes or signatures.\n\
         Return ONLY valid JSON.\n\n\
         From: {}\n\
         Subject: {}\n\
         Conversation:\n{}",
        conversation.display_sender,
        conversation.subject,
        conversation.transcript_text(),
    )
}
