//! Reply post-processing.
//!
//! Models routinely leak reasoning blocks, self-identifying prefixes and
//! wrapping quotes into chat replies. `clean_reply` is a pure text transform
//! that strips all of these and is idempotent: cleaning an already-clean
//! string changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Substituted when a reply sanitizes down to nothing, so a turn is never
/// silently dropped.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "...";

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think-block pattern"));

/// Cleans raw model output into a presentable chat message.
///
/// Strips `<think>` blocks, leading self-identifying prefixes (the persona's
/// name or a generic role word followed by a colon), and wrapping quotes,
/// repeating until the text is stable.
pub fn clean_reply(raw: &str, persona_name: &str) -> String {
    let without_reasoning = THINK_BLOCK.replace_all(raw, "");
    let prefix = prefix_pattern(persona_name);

    let mut text = without_reasoning.trim().to_string();
    loop {
        let mut next = prefix.replace(&text, "").trim_start().to_string();
        next = strip_wrapping_quotes(&next).trim().to_string();
        if next == text {
            break;
        }
        text = next;
    }

    if text.is_empty() {
        EMPTY_REPLY_PLACEHOLDER.to_string()
    } else {
        text
    }
}

/// Matches a leading `Name:` / `Me:` / `System:` style prefix, with either an
/// ASCII or full-width colon. The colon is required; bare role words at the
/// start of a sentence are legitimate content.
fn prefix_pattern(persona_name: &str) -> Regex {
    let pattern = format!(
        r"(?i)^({}|Me|I|我|System|Role|Assistant)[:：]\s*",
        regex::escape(persona_name)
    );
    Regex::new(&pattern).expect("escaped prefix pattern is valid")
}

fn strip_wrapping_quotes(text: &str) -> String {
    let mut current = text;
    loop {
        let mut next = current;
        if let Some(rest) = next.strip_prefix('"').or_else(|| next.strip_prefix('\'')) {
            next = rest;
        }
        if let Some(rest) = next.strip_suffix('"').or_else(|| next.strip_suffix('\'')) {
            next = rest;
        }
        if next == current {
            return current.to_string();
        }
        current = next;
    }
}
