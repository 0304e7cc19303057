use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::MailConfig;

/// Outbound e-mail. Callers log failures and carry on.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// HTML mail over an SMTP relay (STARTTLS).
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid mail.from address {:?}", cfg.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .with_context(|| format!("failed to set up SMTP relay {}", cfg.smtp_host))?
            .port(cfg.smtp_port);
        if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let message = compose(&self.from, to, subject, html)?;
        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        tracing::info!(to, subject, "mail delivered");
        Ok(())
    }
}

fn compose(from: &Mailbox, to: &str, subject: &str, html: &str) -> anyhow::Result<Message> {
    let to = to
        .parse::<Mailbox>()
        .with_context(|| format!("invalid recipient address {to:?}"))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())
        .context("failed to build mail message")
}

/// Stand-in used while delivery is switched off.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            from: cfg.from.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        tracing::warn!(
            from = %self.from,
            to,
            subject,
            bytes = html.len(),
            "mail delivery disabled; message was not delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lettre::message::Mailbox;

    use super::{EmailSender, LogMailer, compose};
    use crate::config::MailConfig;

    fn sender() -> Mailbox {
        "Accounts <no-reply@example.com>".parse().expect("valid mailbox")
    }

    #[tokio::test]
    async fn log_mailer_drops_messages_without_failing() {
        let mailer = LogMailer::new(&MailConfig::default());

        assert!(mailer.send("a@example.com", "Hi", "<p>hi</p>").await.is_ok());
    }

    #[test]
    fn composed_message_is_html_from_the_configured_sender() {
        let message = compose(&sender(), "alice@example.com", "Reset", "<a href=\"x\">go</a>")
            .expect("message should build");

        let raw = String::from_utf8(message.formatted()).expect("utf-8 message");
        assert!(raw.contains("From: Accounts <no-reply@example.com>"));
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Subject: Reset"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn bad_recipient_is_an_error() {
        let err = compose(&sender(), "not an address", "Reset", "<p>x</p>")
            .expect_err("recipient should be refused");

        assert!(format!("{err:#}").contains("invalid recipient address"));
    }
}
