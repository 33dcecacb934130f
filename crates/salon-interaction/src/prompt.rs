//! Prompt assembly.
//!
//! Pure functions turning (persona, roster, history) into model request
//! payloads. No state, no I/O.

use crate::client::WireMessage;
use salon_core::persona::Persona;
use salon_core::session::ChatMessage;

/// How many trailing messages are replayed into a reply prompt.
pub const HISTORY_WINDOW: usize = 20;

/// How many trailing non-system messages the moderator sees.
pub const MODERATOR_CONTEXT: usize = 3;

/// System instruction fixing the persona's voice and output format.
pub fn system_instruction(target: &Persona, roster: &[Persona]) -> String {
    let participant_names: Vec<&str> = roster
        .iter()
        .filter(|p| !p.is_human)
        .map(|p| p.name.as_str())
        .collect();

    format!(
        "You are {name}.\n\
         Description: {description}\n\
         \n\
         CONTEXT:\n\
         - You are chatting in a casual group chat.\n\
         - Participants: {participants}\n\
         - Current User: \"Me\"\n\
         \n\
         INSTRUCTIONS:\n\
         - Speak strictly as {name}.\n\
         - Keep messages SHORT, casual, and colloquial.\n\
         - Do NOT use formal letter formats.\n\
         - NEVER start the message with your name (e.g. \"{name}: ...\").\n\
         - NEVER output \"Me:\" or \"System:\".\n\
         - Reply directly to the context.",
        name = target.name,
        description = target.system_instruction,
        participants = participant_names.join(", "),
    )
}

/// Maps the history tail into role-tagged turns for a reply by `target`.
///
/// The target persona's own messages become `assistant` turns; everything
/// else becomes a `user` turn prefixed with the sender's display name, so the
/// model can distinguish speakers inside one flattened conversation.
pub fn reply_messages(
    target: &Persona,
    roster: &[Persona],
    history: &[ChatMessage],
) -> Vec<WireMessage> {
    let mut messages = vec![WireMessage::system(system_instruction(target, roster))];

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for msg in &history[start..] {
        if msg.is_system {
            continue;
        }
        if msg.sender_id == target.id {
            messages.push(WireMessage::assistant(msg.content.clone()));
        } else {
            let prefix = roster
                .iter()
                .find(|p| p.id == msg.sender_id)
                .map(|p| format!("{}: ", p.name))
                .unwrap_or_else(|| "Unknown: ".to_string());
            messages.push(WireMessage::user(format!("{prefix}{}", msg.content)));
        }
    }

    messages
}

/// Compact next-speaker instruction for the moderator.
///
/// Kept terse for fast inference with small moderator models.
pub fn moderator_prompt(
    recent: &[ChatMessage],
    roster: &[Persona],
    candidates: &[Persona],
) -> String {
    let context: Vec<String> = recent
        .iter()
        .map(|msg| {
            let sender = roster
                .iter()
                .find(|p| p.id == msg.sender_id)
                .map(|p| p.name.as_str())
                .unwrap_or("User");
            format!("{sender}: {}", msg.content)
        })
        .collect();

    let candidate_list: Vec<String> = candidates
        .iter()
        .map(|p| {
            format!(
                "- ID: \"{}\", Name: \"{}\", Role: \"{}\"",
                p.id, p.name, p.description
            )
        })
        .collect();

    format!(
        "Task: Decide who speaks next in this group chat.\n\
         Context:\n\
         {context}\n\
         \n\
         Candidates:\n\
         {candidates}\n\
         \n\
         Rules:\n\
         1. If someone was asked a question, pick them.\n\
         2. Otherwise, pick the most relevant character to the topic.\n\
         3. Output JSON ONLY: {{ \"nextSpeakerId\": \"ID\" }}",
        context = context.join("\n"),
        candidates = candidate_list.join("\n"),
    )
}
