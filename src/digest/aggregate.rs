use std::collections::{BTreeSet, HashMap};

use crate::constants::{DIGEST_SUBJECT_MARKER, DIGEST_SUBJECT_PREFIX, UNKNOWN_SENDER};
use crate::mail::types::{RawMessage, normalize_address};

use super::window::WindowBounds;

/// A materialized conversation: the messages sharing one conversation key
/// inside the lookback window, with a resolved reply target.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Subject of the first-listed message in the group.
    pub subject: String,
    /// Display sender ("Name <addr>") of the first-listed message.
    pub display_sender: String,
    /// Normalized addresses seen across the group.
    pub participants: BTreeSet<String>,
    /// "sender said: excerpt" lines in chronological order.
    pub transcript: Vec<String>,
    /// Address any generated reply should go to. Non-empty whenever at
    /// least one message in the group has a resolvable sender.
    pub reply_target: String,
}

impl Conversation {
    pub fn transcript_text(&self) -> String {
        self.transcript.join("\n")
    }
}

/// Group raw messages into conversations:
/// 1. Re-apply the window cutoff locally (provider filters are not trusted).
/// 2. Group by conversation key, preserving the listing order of each
///    group's first message. Keyless messages were already dropped at
///    construction, so every message here is routable.
/// 3. Sort each group chronologically (stable, ties keep listing order).
/// 4. Collect normalized participant addresses.
/// 5. Discard groups where every participant is the account owner.
/// 6. Resolve the reply target (see [`resolve_reply_target`]).
/// 7. Discard threads started by our own previously sent digests.
pub fn aggregate_conversations(
    messages: &[RawMessage],
    bounds: &WindowBounds,
    own_address: &str,
) -> Vec<Conversation> {
    let own = normalize_address(own_address);

    // Group by key, keeping first-appearance order of the groups themselves.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RawMessage>> = HashMap::new();
    for msg in messages {
        if !bounds.contains(msg.received_at) {
            tracing::debug!(id = %msg.id, "message outside lookback window, skipping");
            continue;
        }
        let entry = groups.entry(msg.conversation_key.as_str()).or_default();
        if entry.is_empty() {
            order.push(msg.conversation_key.as_str());
        }
        entry.push(msg);
    }
    tracing::debug!(groups = order.len(), "grouped messages by conversation key");

    let mut conversations = Vec::new();
    for key in order {
        let group = &groups[key];

        // First-listed message drives subject and display sender.
        let first = group[0];
        if is_own_digest_subject(&first.subject) {
            tracing::debug!(subject = %first.subject, "skipping our own digest thread");
            continue;
        }

        let mut sorted: Vec<&RawMessage> = group.clone();
        sorted.sort_by_key(|m| m.received_at);

        let mut participants = BTreeSet::new();
        let mut transcript = Vec::with_capacity(sorted.len());
        for msg in &sorted {
            let addr = normalize_address(&msg.from_address);
            let label = if addr.is_empty() {
                UNKNOWN_SENDER.to_string()
            } else {
                participants.insert(addr.clone());
                addr
            };
            transcript.push(format!("{} said: {}", label, msg.body_preview.trim()));
        }

        // Self-only threads carry nothing worth summarizing.
        if !participants.is_empty() && participants.iter().all(|p| *p == own) {
            tracing::debug!(key, "conversation has no outside participant, skipping");
            continue;
        }

        let reply_target = resolve_reply_target(&sorted, &own);

        conversations.push(Conversation {
            subject: first.subject.clone(),
            display_sender: first.display_from(),
            participants,
            transcript,
            reply_target,
        });
    }

    tracing::info!(count = conversations.len(), "aggregated conversations");
    conversations
}

/// Pick the address a reply should go to: scanning newest-first, the first
/// Reply-To or From address that is not the owner's own. When the whole
/// thread is owner-sent, fall back to the last message's sender so the
/// target is never empty for a resolvable thread.
fn resolve_reply_target(chronological: &[&RawMessage], own: &str) -> String {
    for msg in chronological.iter().rev() {
        let candidates = [msg.reply_to_address.as_deref(), Some(msg.from_address.as_str())];
        for candidate in candidates.into_iter().flatten() {
            let addr = normalize_address(candidate);
            if !addr.is_empty() && addr != own {
                return addr;
            }
        }
    }
    chronological
        .last()
        .map(|m| normalize_address(&m.from_address))
        .unwrap_or_default()
}

/// Whether a subject belongs to a digest this tool previously sent.
/// Matches any period variant (Daily/Morning/Afternoon).
fn is_own_digest_subject(subject: &str) -> bool {
    subject.starts_with(DIGEST_SUBJECT_PREFIX) && subject.contains(DIGEST_SUBJECT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn bounds() -> WindowBounds {
        WindowBounds {
            start: base_time() - Duration::hours(24),
            end: None,
        }
    }

    fn msg(id: &str, key: &str, from: &str, minutes: i64, subject: &str) -> RawMessage {
        RawMessage::new(
            id,
            key,
            from,
            None,
            base_time() + Duration::minutes(minutes),
            Some(subject.to_string()),
            format!("body of {}", id),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_transcript_is_chronological() {
        // Listed newest-first, like the Graph API returns them.
        let messages = vec![
            msg("m2", "c1", "b@x.com", 10, "Hi"),
            msg("m1", "c1", "a@x.com", 0, "Hi"),
        ];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs.len(), 1);
        assert_eq!(
            convs[0].transcript,
            vec!["a@x.com said: body of m1", "b@x.com said: body of m2"]
        );
        // Subject and sender come from the first-listed message, pre-sort.
        assert_eq!(convs[0].display_sender, "b@x.com");
    }

    #[test]
    fn test_window_cutoff_applied_locally() {
        let mut stale = msg("m1", "c1", "a@x.com", 0, "Old");
        stale.received_at = base_time() - Duration::hours(48);
        let convs = aggregate_conversations(&[stale], &bounds(), "me@x.com");
        assert!(convs.is_empty());
    }

    #[test]
    fn test_self_only_conversation_discarded() {
        let messages = vec![msg("m1", "c1", "Me@X.com", 0, "Note to self")];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert!(convs.is_empty());
    }

    #[test]
    fn test_single_outside_message_kept() {
        let messages = vec![msg("m1", "c1", "a@x.com", 0, "Hi")];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].reply_target, "a@x.com");
    }

    #[test]
    fn test_reply_target_prefers_latest_non_owner() {
        // a@x then me@x, owner me@x -> target is the earlier outside sender.
        let messages = vec![
            msg("m1", "c1", "a@x.com", 0, "Hi"),
            msg("m2", "c1", "me@x.com", 10, "Hi"),
        ];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].reply_target, "a@x.com");
        assert!(convs[0].participants.contains("a@x.com"));
        assert!(convs[0].participants.contains("me@x.com"));
    }

    #[test]
    fn test_reply_target_honors_reply_to_header() {
        let mut with_header = msg("m2", "c1", "list@x.com", 10, "Hi");
        with_header.reply_to_address = Some("Human <human@x.com>".to_string());
        let messages = vec![msg("m1", "c1", "a@x.com", 0, "Hi"), with_header];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs[0].reply_target, "human@x.com");
    }

    #[test]
    fn test_reply_target_skips_owner_reply_to() {
        // Owner's own Reply-To must not win; scan continues to older mail.
        let mut own_last = msg("m2", "c1", "me@x.com", 10, "Hi");
        own_last.reply_to_address = Some("me@x.com".to_string());
        let messages = vec![msg("m1", "c1", "a@x.com", 0, "Hi"), own_last];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs[0].reply_target, "a@x.com");
    }

    #[test]
    fn test_digest_thread_excluded() {
        let messages = vec![msg(
            "m1",
            "c1",
            "a@x.com",
            0,
            "\u{1F4EC} Daily Email Digest – March 15, 2024",
        )];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert!(convs.is_empty());
    }

    #[test]
    fn test_groups_keep_listing_order() {
        let messages = vec![
            msg("m1", "c2", "b@x.com", 20, "Second topic"),
            msg("m2", "c1", "a@x.com", 0, "First topic"),
            msg("m3", "c2", "b@x.com", 30, "Second topic"),
        ];
        let convs = aggregate_conversations(&messages, &bounds(), "me@x.com");
        assert_eq!(convs.len(), 2);
        assert_eq!(convs[0].subject, "Second topic");
        assert_eq!(convs[1].subject, "First topic");
    }

    #[test]
    fn test_empty_preview_still_produces_line() {
        let mut empty = msg("m1", "c1", "a@x.com", 0, "Hi");
        empty.body_preview = String::new();
        let convs = aggregate_conversations(&[empty], &bounds(), "me@x.com");
        assert_eq!(convs[0].transcript, vec!["a@x.com said: "]);
    }

    #[test]
    fn test_unresolvable_sender_gets_sentinel() {
        let mut anon = msg("m1", "c1", "  ", 0, "Hi");
        anon.from_address = String::new();
        let other = msg("m2", "c1", "a@x.com", 10, "Hi");
        let convs = aggregate_conversations(&[anon, other], &bounds(), "me@x.com");
        assert_eq!(convs[0].transcript[0], "unknown said: body of m1");
    }
}
