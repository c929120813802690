//! Microsoft Graph mail provider
//!
//! Lists recent inbox messages (with transparent @odata.nextLink
//! pagination) and sends the rendered digest through /me/sendMail.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::constants::{GRAPH_PAGE_SIZE, HTTP_TIMEOUT_SECS};
use crate::credentials::TokenCache;
use crate::digest::WindowBounds;
use crate::oauth::MicrosoftOAuth;

use super::types::RawMessage;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<GraphMessage>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<Recipient>,
    #[serde(default)]
    reply_to: Vec<Recipient>,
    received_date_time: String,
    #[serde(default)]
    body_preview: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    #[serde(default)]
    email_address: EmailAddress,
}

#[derive(Debug, Default, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

impl GraphMessage {
    fn into_raw(self) -> Result<RawMessage> {
        let received_at = chrono::DateTime::parse_from_rfc3339(&self.received_date_time)
            .with_context(|| format!("Bad receivedDateTime: {}", self.received_date_time))?
            .to_utc();

        let (from_address, from_name) = match self.from {
            Some(r) => (
                r.email_address.address.unwrap_or_default(),
                r.email_address.name.filter(|n| !n.is_empty()),
            ),
            None => (String::new(), None),
        };

        let reply_to_address = self
            .reply_to
            .into_iter()
            .next()
            .and_then(|r| r.email_address.address)
            .filter(|a| !a.is_empty());

        RawMessage::new(
            self.id,
            self.conversation_id.unwrap_or_default(),
            from_address,
            from_name,
            received_at,
            self.subject,
            self.body_preview.unwrap_or_default(),
            reply_to_address,
        )
    }
}

pub struct GraphClient {
    http: reqwest::Client,
    access_token: String,
}

impl GraphClient {
    /// Authenticate (cached token, refresh, or device-code sign-in) and
    /// build a ready client.
    pub async fn connect(tenant_id: &str, client_id: &str, email: &str) -> Result<Self> {
        let oauth = MicrosoftOAuth::new(tenant_id, client_id)?;
        let cache = TokenCache::new(email);
        let access_token = oauth
            .access_token(&cache)
            .await
            .context("Microsoft Graph authentication failed")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http, access_token })
    }

    /// List inbox messages inside the window, flattened across pages.
    /// The aggregator re-applies the cutoff; the filter here just keeps
    /// the transfer small.
    pub async fn list_recent_messages(&self, bounds: &WindowBounds) -> Result<Vec<RawMessage>> {
        let filter = match bounds.end {
            Some(end) => format!(
                "receivedDateTime ge {} and receivedDateTime lt {}",
                graph_ts(bounds.start),
                graph_ts(end)
            ),
            None => format!("receivedDateTime ge {}", graph_ts(bounds.start)),
        };

        let mut url = format!("{}/me/mailFolders/Inbox/messages", GRAPH_BASE);
        let mut query = Some(vec![
            (
                "$select",
                "id,subject,from,replyTo,receivedDateTime,bodyPreview,conversationId".to_string(),
            ),
            ("$filter", filter),
            ("$orderby", "receivedDateTime desc".to_string()),
            ("$top", GRAPH_PAGE_SIZE.to_string()),
        ]);

        let mut messages = Vec::new();
        loop {
            let mut request = self.http.get(&url).bearer_auth(&self.access_token);
            if let Some(ref q) = query {
                request = request.query(q);
            }
            let response = request.send().await.context("Graph list request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("Graph list failed ({}): {}", status, body);
            }

            let page: MessagePage = response
                .json()
                .await
                .context("Failed to parse Graph message page")?;

            for msg in page.value {
                let id = msg.id.clone();
                match msg.into_raw() {
                    Ok(raw) => messages.push(raw),
                    Err(e) => tracing::debug!(id, "dropping unroutable message: {e}"),
                }
            }

            match page.next_link {
                Some(next) => {
                    // nextLink carries the full query; pass it through as-is.
                    url = next;
                    query = None;
                }
                None => break,
            }
        }

        tracing::info!(count = messages.len(), "fetched inbox messages from Graph");
        Ok(messages)
    }

    /// Deliver the digest through /me/sendMail.
    pub async fn send(&self, to_address: &str, subject: &str, html_body: &str) -> Result<()> {
        let message = json!({
            "message": {
                "subject": subject,
                "body": { "contentType": "HTML", "content": html_body },
                "toRecipients": [
                    { "emailAddress": { "address": to_address } }
                ],
            }
        });

        let response = self
            .http
            .post(format!("{}/me/sendMail", GRAPH_BASE))
            .bearer_auth(&self.access_token)
            .json(&message)
            .send()
            .await
            .context("Graph sendMail request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Graph sendMail failed ({}): {}", status, body);
        }

        tracing::info!(to = to_address, "digest sent via Microsoft Graph");
        Ok(())
    }
}

/// Graph wants second-precision UTC timestamps with a literal Z.
fn graph_ts(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_graph_ts_format() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap();
        assert_eq!(graph_ts(ts), "2024-03-15T09:30:05Z");
    }

    #[test]
    fn test_parse_message_page() {
        let payload = r#"{
            "value": [{
                "id": "m1",
                "conversationId": "c1",
                "subject": "Hi",
                "from": {"emailAddress": {"name": "Ada", "address": "a@x.com"}},
                "replyTo": [{"emailAddress": {"address": "list@x.com"}}],
                "receivedDateTime": "2024-03-15T09:30:05Z",
                "bodyPreview": "hello"
            }],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/next"
        }"#;

        let page: MessagePage = serde_json::from_str(payload).unwrap();
        assert_eq!(page.next_link.as_deref(), Some("https://graph.microsoft.com/v1.0/next"));

        let raw = page.value.into_iter().next().unwrap().into_raw().unwrap();
        assert_eq!(raw.conversation_key, "c1");
        assert_eq!(raw.from_address, "a@x.com");
        assert_eq!(raw.from_display_name.as_deref(), Some("Ada"));
        assert_eq!(raw.reply_to_address.as_deref(), Some("list@x.com"));
        assert_eq!(raw.body_preview, "hello");
    }

    #[test]
    fn test_message_without_conversation_id_is_rejected() {
        let payload = r#"{
            "id": "m1",
            "receivedDateTime": "2024-03-15T09:30:05Z"
        }"#;
        let msg: GraphMessage = serde_json::from_str(payload).unwrap();
        assert!(msg.into_raw().is_err());
    }
}
