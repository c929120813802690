//! Provider layer: concrete mail clients behind one dispatching enum.

pub mod gmail;
pub mod graph;
pub mod smtp;
pub mod types;

use anyhow::{Context, Result};
use std::env;

use crate::config::{AccountConfig, ENV_SMTP_PASSWORD, ProviderConfig};
use crate::digest::WindowBounds;

pub use types::RawMessage;

/// The configured mail provider. The pipeline only sees this enum, so the
/// aggregation and digest logic stays provider-agnostic.
pub enum MailProvider {
    Graph(graph::GraphClient),
    Gmail {
        client: gmail::GmailClient,
        smtp: smtp::SmtpClient,
    },
}

impl MailProvider {
    /// Authenticate against the configured provider. Interactive sign-in
    /// only happens when the token cache is cold.
    pub async fn connect(account: &AccountConfig) -> Result<Self> {
        match &account.provider {
            ProviderConfig::Graph { tenant_id, client_id } => {
                let client =
                    graph::GraphClient::connect(tenant_id, client_id, &account.email).await?;
                Ok(Self::Graph(client))
            }
            ProviderConfig::Gmail { client_id, client_secret, smtp } => {
                let client = gmail::GmailClient::connect(
                    client_id,
                    client_secret.as_deref(),
                    &account.email,
                )
                .await?;
                let password = env::var(ENV_SMTP_PASSWORD)
                    .with_context(|| format!("{} not set (Gmail app password)", ENV_SMTP_PASSWORD))?;
                let smtp = smtp::SmtpClient::new(
                    smtp,
                    &password,
                    &account.email,
                    account.display_name.as_deref(),
                )?;
                Ok(Self::Gmail { client, smtp })
            }
        }
    }

    /// List recent inbox messages as a flattened, complete sequence.
    pub async fn list_recent_messages(&self, bounds: &WindowBounds) -> Result<Vec<RawMessage>> {
        match self {
            Self::Graph(client) => client.list_recent_messages(bounds).await,
            Self::Gmail { client, .. } => client.list_recent_messages().await,
        }
    }

    /// Deliver the rendered digest.
    pub async fn send(&self, to_address: &str, subject: &str, html_body: &str) -> Result<()> {
        match self {
            Self::Graph(client) => client.send(to_address, subject, html_body).await,
            Self::Gmail { smtp, .. } => smtp.send_html(to_address, subject, html_body).await,
        }
    }
}
