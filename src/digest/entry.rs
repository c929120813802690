use serde::{Deserialize, Serialize};

use crate::ai::{SummarizerClient, digest_prompt};
use crate::constants::{DEFAULT_REPLY_LABEL, MAX_REPLY_OPTIONS, SUMMARY_MAX_TOKENS};

use super::aggregate::Conversation;

/// The per-conversation digest bundle shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct DigestEntry {
    pub subject: String,
    pub sender: String,
    pub summary: String,
    pub suggested_action: String,
    pub reply_options: Vec<ReplyOption>,
    pub reply_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyOption {
    pub label: String,
    pub body: String,
}

/// Which path the payload parser took. Degradation is expected behavior,
/// not an error, so the outcome is explicit instead of buried in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The raw text parsed as JSON directly.
    Parsed,
    /// Strict parse failed; the substring between the first '{' and the
    /// last '}' parsed instead.
    Salvaged,
    /// Nothing parseable; all fields default to empty.
    Empty,
}

/// Wire shape of the model payload. Extra fields are ignored; missing
/// fields default so a partial object still yields a usable entry.
#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    replies: Vec<RawReply>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    label: String,
    #[serde(default)]
    body: String,
}

/// Parse the model's raw text: strict JSON first, brace-substring salvage
/// second, empty payload last. Never fails.
fn parse_payload(raw: &str) -> (Payload, ParseOutcome) {
    if let Ok(payload) = serde_json::from_str::<Payload>(raw) {
        return (payload, ParseOutcome::Parsed);
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}'))
        && start < end
        && let Ok(payload) = serde_json::from_str::<Payload>(&raw[start..=end])
    {
        return (payload, ParseOutcome::Salvaged);
    }

    (Payload::default(), ParseOutcome::Empty)
}

/// Normalize a reply-option label: trim, spaces to hyphens, cut at the
/// first '/', lowercase; empty becomes "reply". Idempotent.
fn normalize_label(raw: &str) -> String {
    let label = raw
        .trim()
        .replace(' ', "-")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if label.is_empty() {
        DEFAULT_REPLY_LABEL.to_string()
    } else {
        label
    }
}

/// Apply §3 normalization to the parsed payload: cap at three options,
/// drop empty bodies, normalize labels.
fn normalize_replies(replies: Vec<RawReply>) -> Vec<ReplyOption> {
    replies
        .into_iter()
        .take(MAX_REPLY_OPTIONS)
        .filter_map(|r| {
            let body = r.body.trim().to_string();
            if body.is_empty() {
                return None;
            }
            Some(ReplyOption {
                label: normalize_label(&r.label),
                body,
            })
        })
        .collect()
}

fn entry_from_payload(conversation: &Conversation, payload: Payload) -> DigestEntry {
    DigestEntry {
        subject: conversation.subject.clone(),
        sender: conversation.display_sender.clone(),
        summary: payload.summary.trim().to_string(),
        suggested_action: payload.action.trim().to_string(),
        reply_options: normalize_replies(payload.replies),
        reply_target: conversation.reply_target.clone(),
    }
}

/// Turn one conversation into a digest entry. A failed or unparseable
/// summarization call degrades to an entry with empty fields; this
/// boundary never propagates an error, so one bad conversation cannot
/// abort the run.
pub async fn generate_entry(client: &SummarizerClient, conversation: &Conversation) -> DigestEntry {
    let prompt = digest_prompt(conversation);
    match client.summarize(&prompt, SUMMARY_MAX_TOKENS).await {
        Ok(raw) => {
            let (payload, outcome) = parse_payload(&raw);
            match outcome {
                ParseOutcome::Parsed => {}
                ParseOutcome::Salvaged => {
                    tracing::warn!(subject = %conversation.subject, "salvaged JSON from model response")
                }
                ParseOutcome::Empty => {
                    tracing::warn!(subject = %conversation.subject, "unparseable model response, emitting empty entry")
                }
            }
            entry_from_payload(conversation, payload)
        }
        Err(e) => {
            tracing::error!(subject = %conversation.subject, "summarization failed: {e:#}");
            entry_from_payload(conversation, Payload::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse() {
        let raw = r#"{"summary":"ok","action":"reply","replies":[{"label":"yes","body":"Sounds good."}]}"#;
        let (payload, outcome) = parse_payload(raw);
        assert_eq!(outcome, ParseOutcome::Parsed);
        assert_eq!(payload.summary, "ok");
        assert_eq!(payload.replies.len(), 1);
    }

    #[test]
    fn test_salvage_parse() {
        // Chatter around an embedded object.
        let raw = "Sure! {\"summary\":\"ok\",\"action\":\"reply\",\"replies\":[]} Thanks";
        let (payload, outcome) = parse_payload(raw);
        assert_eq!(outcome, ParseOutcome::Salvaged);
        assert_eq!(payload.summary, "ok");
        assert_eq!(payload.action, "reply");
        assert!(payload.replies.is_empty());
    }

    #[test]
    fn test_no_braces_degrades_to_empty() {
        let (payload, outcome) = parse_payload("I could not summarize this.");
        assert_eq!(outcome, ParseOutcome::Empty);
        assert!(payload.summary.is_empty());
        assert!(payload.action.is_empty());
        assert!(payload.replies.is_empty());
    }

    #[test]
    fn test_garbage_braces_degrade_to_empty() {
        let (_, outcome) = parse_payload("{not json}");
        assert_eq!(outcome, ParseOutcome::Empty);
    }

    #[test]
    fn test_partial_object_fills_defaults() {
        let (payload, outcome) = parse_payload(r#"{"summary":"just this"}"#);
        assert_eq!(outcome, ParseOutcome::Parsed);
        assert_eq!(payload.summary, "just this");
        assert!(payload.action.is_empty());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Confirm"), "confirm");
        assert_eq!(normalize_label("Let's Go/Maybe"), "let's-go");
        assert_eq!(normalize_label("  "), "reply");
        assert_eq!(normalize_label(""), "reply");
        // Idempotent
        assert_eq!(normalize_label(&normalize_label("Let's Go/Maybe")), "let's-go");
        assert_eq!(normalize_label("reply"), "reply");
    }

    #[test]
    fn test_replies_capped_and_empty_bodies_dropped() {
        let replies = vec![
            RawReply { label: "a".into(), body: "one".into() },
            RawReply { label: "b".into(), body: "   ".into() },
            RawReply { label: "c".into(), body: "three".into() },
            RawReply { label: "d".into(), body: "four".into() },
        ];
        let options = normalize_replies(replies);
        // Cap applies before the empty-body drop, matching replies[:3].
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].body, "one");
        assert_eq!(options[1].body, "three");
    }
}
