//! End-to-end digest run: list → aggregate → generate → render → send.
//!
//! Error taxonomy: authentication and listing failures are fatal (nothing
//! is sent); a failed summarization degrades that one entry and the run
//! continues; a delivery failure after rendering is surfaced without
//! retry. Zero conversations after filtering is a clean no-op, not an
//! error.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::ai::SummarizerClient;
use crate::config::Config;
use crate::digest::{
    Conversation, DigestEntry, LinkMode, TimeRange, aggregate_conversations, digest_subject,
    generate_entry, render_digest,
};
use crate::mail::MailProvider;

/// How a run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No conversations survived filtering; nothing was sent.
    Empty,
    /// Digest rendered and delivered.
    Sent { conversations: usize },
    /// Preview mode: entries printed, nothing sent.
    Previewed { conversations: usize },
}

pub async fn run(config: &Config, range: TimeRange, preview: bool) -> Result<RunOutcome> {
    let now = Utc::now();
    let bounds = range.bounds(now);
    tracing::info!(
        range = range.period_label(),
        start = %bounds.start,
        end = ?bounds.end,
        "starting digest run"
    );

    let provider = MailProvider::connect(&config.account)
        .await
        .context("Mail provider authentication failed")?;

    let messages = provider
        .list_recent_messages(&bounds)
        .await
        .context("Failed to list recent messages")?;

    let conversations = aggregate_conversations(&messages, &bounds, &config.account.email);
    if conversations.is_empty() {
        tracing::info!("no recent conversations found, nothing to send");
        return Ok(RunOutcome::Empty);
    }

    let entries = generate_entries(config, &conversations).await?;

    if preview {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(RunOutcome::Previewed {
            conversations: entries.len(),
        });
    }

    let mode = LinkMode::parse(&config.digest.link_mode);
    let html = render_digest(&entries, mode, now);
    let subject = digest_subject(range, now);

    provider
        .send(config.digest_recipient(), &subject, &html)
        .await
        .context("Digest was generated but delivery failed")?;

    Ok(RunOutcome::Sent {
        conversations: entries.len(),
    })
}

/// Summarize conversations one at a time, in list order. Per-conversation
/// failures degrade inside [`generate_entry`]; only a missing API key can
/// fail here.
async fn generate_entries(
    config: &Config,
    conversations: &[Conversation],
) -> Result<Vec<DigestEntry>> {
    let client = SummarizerClient::new(config.ai.resolved_api_key()?, config.ai.model.clone())?;

    let mut entries = Vec::with_capacity(conversations.len());
    for (i, conversation) in conversations.iter().enumerate() {
        tracing::debug!(
            n = i + 1,
            total = conversations.len(),
            subject = %conversation.subject,
            "summarizing conversation"
        );
        entries.push(generate_entry(&client, conversation).await);
    }
    Ok(entries)
}
