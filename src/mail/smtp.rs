use anyhow::{Context, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// SMTP delivery for the Gmail provider path. Uses the account's app
/// password over implicit TLS (smtp.gmail.com:465 by default).
pub struct SmtpClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: Option<String>,
}

impl SmtpClient {
    pub fn new(
        config: &SmtpConfig,
        password: &str,
        from_email: &str,
        from_name: Option<&str>,
    ) -> Result<Self> {
        let creds = Credentials::new(from_email.to_string(), password.to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .context("Failed to create SMTP transport")?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from_email: from_email.to_string(),
            from_name: from_name.map(|s| s.to_string()),
        })
    }

    /// Send the digest as a multipart alternative: a short plain-text
    /// notice plus the HTML document.
    pub async fn send_html(&self, to_address: &str, subject: &str, html_body: &str) -> Result<()> {
        let from_mailbox = if let Some(ref name) = self.from_name {
            format!("{} <{}>", name, self.from_email)
                .parse::<Mailbox>()
                .context("Invalid from address")?
        } else {
            self.from_email
                .parse::<Mailbox>()
                .context("Invalid from address")?
        };

        let to_mailbox = to_address
            .parse::<Mailbox>()
            .context(format!("Invalid recipient address: {}", to_address))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                "Your email digest is attached as HTML.".to_string(),
                html_body.to_string(),
            ))
            .context("Failed to build digest message")?;

        self.transport
            .send(message)
            .await
            .context("Failed to send digest via SMTP")?;

        tracing::info!(to = to_address, "digest sent via SMTP");
        Ok(())
    }
}
