use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::constants::NO_SUBJECT;

/// One delivered email as reported by a provider, reduced to the fields the
/// digest pipeline needs. Full bodies are never fetched; `body_preview` is
/// the provider's truncated plain-text excerpt.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    /// Provider-supplied grouping identifier (Graph conversationId,
    /// Gmail threadId). Never empty.
    pub conversation_key: String,
    pub from_address: String,
    pub from_display_name: Option<String>,
    pub received_at: DateTime<Utc>,
    pub subject: String,
    pub body_preview: String,
    /// Explicit Reply-To header content, where the provider reports one.
    pub reply_to_address: Option<String>,
}

impl RawMessage {
    /// Build a message, rejecting an empty conversation key. A message that
    /// cannot be grouped is unroutable and callers should drop it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        conversation_key: impl Into<String>,
        from_address: impl Into<String>,
        from_display_name: Option<String>,
        received_at: DateTime<Utc>,
        subject: Option<String>,
        body_preview: impl Into<String>,
        reply_to_address: Option<String>,
    ) -> Result<Self> {
        let conversation_key = conversation_key.into();
        if conversation_key.is_empty() {
            bail!("message has no conversation key");
        }

        let subject = subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string());

        Ok(Self {
            id: id.into(),
            conversation_key,
            from_address: from_address.into(),
            from_display_name,
            received_at,
            subject,
            body_preview: body_preview.into(),
            reply_to_address,
        })
    }

    /// Sender as shown in the digest header: "Name <addr>" when a display
    /// name is known, the bare address otherwise.
    pub fn display_from(&self) -> String {
        match self.from_display_name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.from_address),
            _ => self.from_address.clone(),
        }
    }
}

/// Normalize an address for comparison: strip an RFC-2822 style display name
/// ("Name <addr>" becomes "addr"), trim, lowercase. Idempotent.
pub fn normalize_address(raw: &str) -> String {
    let s = raw.trim();
    let addr = match (s.rfind('<'), s.rfind('>')) {
        (Some(start), Some(end)) if start < end => &s[start + 1..end],
        _ => s,
    };
    addr.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_rejects_empty_conversation_key() {
        let result = RawMessage::new(
            "m1",
            "",
            "a@x.com",
            None,
            ts(),
            Some("Hi".to_string()),
            "",
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_subject_gets_sentinel() {
        let msg =
            RawMessage::new("m1", "c1", "a@x.com", None, ts(), None, "", None).unwrap();
        assert_eq!(msg.subject, "No Subject");

        let blank = RawMessage::new(
            "m2",
            "c1",
            "a@x.com",
            None,
            ts(),
            Some("   ".to_string()),
            "",
            None,
        )
        .unwrap();
        assert_eq!(blank.subject, "No Subject");
    }

    #[test]
    fn test_display_from() {
        let named = RawMessage::new(
            "m1",
            "c1",
            "a@x.com",
            Some("Ada".to_string()),
            ts(),
            Some("Hi".to_string()),
            "",
            None,
        )
        .unwrap();
        assert_eq!(named.display_from(), "Ada <a@x.com>");

        let bare =
            RawMessage::new("m2", "c1", "a@x.com", None, ts(), None, "", None).unwrap();
        assert_eq!(bare.display_from(), "a@x.com");
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("A@X.com"), "a@x.com");
        assert_eq!(normalize_address("Ada Lovelace <Ada@X.com>"), "ada@x.com");
        assert_eq!(normalize_address("  <b@y.org> "), "b@y.org");
        // Idempotent
        assert_eq!(normalize_address(&normalize_address("Ada <A@X.com>")), "a@x.com");
    }
}
