//! Gmail REST mail provider (read side)
//!
//! Lists recent threads and expands each to its messages. Conversation
//! keys are Gmail thread ids. Sending goes through SMTP instead (see
//! [`super::smtp`]), matching how Gmail app passwords work.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

use crate::constants::{GMAIL_THREAD_LIMIT, HTTP_TIMEOUT_SECS};
use crate::credentials::TokenCache;
use crate::oauth::GoogleOAuth;

use super::types::RawMessage;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadStub>,
}

#[derive(Debug, Deserialize)]
struct ThreadStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Thread {
    #[serde(default)]
    messages: Vec<GmailMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    thread_id: String,
    /// Delivery time in epoch milliseconds, as a decimal string.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl GmailMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn into_raw(self) -> Result<RawMessage> {
        let millis: i64 = self
            .internal_date
            .as_deref()
            .unwrap_or("0")
            .parse()
            .with_context(|| format!("Bad internalDate on message {}", self.id))?;
        let received_at = chrono::DateTime::from_timestamp_millis(millis)
            .with_context(|| format!("internalDate out of range on message {}", self.id))?;

        let (from_address, from_name) =
            split_mailbox(self.header("From").unwrap_or_default());
        let reply_to_address = self
            .header("Reply-To")
            .map(|v| split_mailbox(v).0)
            .filter(|a| !a.is_empty());
        let subject = self.header("Subject").map(|s| s.to_string());

        RawMessage::new(
            self.id.clone(),
            self.thread_id.clone(),
            from_address,
            from_name,
            received_at,
            subject,
            self.snippet.clone(),
            reply_to_address,
        )
    }
}

/// Split an RFC-2822 mailbox "Name <addr>" into (addr, display name).
fn split_mailbox(raw: &str) -> (String, Option<String>) {
    let s = raw.trim();
    match (s.rfind('<'), s.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            let addr = s[start + 1..end].trim().to_string();
            let name = s[..start].trim().trim_matches('"').to_string();
            let name = if name.is_empty() { None } else { Some(name) };
            (addr, name)
        }
        _ => (s.to_string(), None),
    }
}

pub struct GmailClient {
    http: reqwest::Client,
    access_token: String,
}

impl GmailClient {
    /// Authenticate (cached token, refresh, or browser sign-in) and build
    /// a ready client.
    pub async fn connect(
        client_id: &str,
        client_secret: Option<&str>,
        email: &str,
    ) -> Result<Self> {
        let oauth = GoogleOAuth::new(client_id, client_secret)?;
        let cache = TokenCache::new(email);
        let access_token = oauth
            .access_token(&cache)
            .await
            .context("Gmail authentication failed")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http, access_token })
    }

    /// Flatten the most recent threads into their messages. The window
    /// cutoff is the aggregator's job; this just bounds the fetch.
    pub async fn list_recent_messages(&self) -> Result<Vec<RawMessage>> {
        let list: ThreadList = self
            .get_json(&format!(
                "{}/threads?maxResults={}",
                GMAIL_BASE, GMAIL_THREAD_LIMIT
            ))
            .await
            .context("Gmail thread listing failed")?;

        let mut messages = Vec::new();
        for stub in list.threads {
            let thread: Thread = self
                .get_json(&format!("{}/threads/{}?format=full", GMAIL_BASE, stub.id))
                .await
                .with_context(|| format!("Failed to fetch Gmail thread {}", stub.id))?;

            for msg in thread.messages {
                let id = msg.id.clone();
                match msg.into_raw() {
                    Ok(raw) => messages.push(raw),
                    Err(e) => tracing::debug!(id, "dropping unroutable message: {e}"),
                }
            }
        }

        tracing::info!(count = messages.len(), "fetched inbox messages from Gmail");
        Ok(messages)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Gmail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gmail API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse Gmail response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mailbox() {
        assert_eq!(
            split_mailbox("Ada Lovelace <a@x.com>"),
            ("a@x.com".to_string(), Some("Ada Lovelace".to_string()))
        );
        assert_eq!(
            split_mailbox("\"Lovelace, Ada\" <a@x.com>"),
            ("a@x.com".to_string(), Some("Lovelace, Ada".to_string()))
        );
        assert_eq!(split_mailbox("a@x.com"), ("a@x.com".to_string(), None));
        assert_eq!(split_mailbox(""), (String::new(), None));
    }

    #[test]
    fn test_parse_thread_message() {
        let payload = r#"{
            "id": "m1",
            "threadId": "t1",
            "internalDate": "1710495005000",
            "snippet": "hello there",
            "payload": {
                "headers": [
                    {"name": "From", "value": "Ada <a@x.com>"},
                    {"name": "Subject", "value": "Hi"},
                    {"name": "Reply-To", "value": "list@x.com"}
                ]
            }
        }"#;

        let msg: GmailMessage = serde_json::from_str(payload).unwrap();
        let raw = msg.into_raw().unwrap();
        assert_eq!(raw.conversation_key, "t1");
        assert_eq!(raw.from_address, "a@x.com");
        assert_eq!(raw.from_display_name.as_deref(), Some("Ada"));
        assert_eq!(raw.reply_to_address.as_deref(), Some("list@x.com"));
        assert_eq!(raw.received_at.timestamp_millis(), 1_710_495_005_000);
        assert_eq!(raw.subject, "Hi");
        assert_eq!(raw.body_preview, "hello there");
    }
}
