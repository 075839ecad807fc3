use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::channel::{EmailChannel, SmtpSecurity};
use super::{Error, NotificationEvent, Result};

/// A rendered plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn render(event: &NotificationEvent) -> Self {
        let subject = format!(
            "[{}] {}",
            event.severity.as_str().to_uppercase(),
            event.title
        );

        let mut body = format!("{}\n\nSeverity: {}\n", event.message, event.severity);
        if let Some(name) = &event.container_name {
            body.push_str(&format!("Container: {name}\n"));
        }
        if let Some(id) = &event.container_id {
            body.push_str(&format!("Container ID: {id}\n"));
        }
        body.push_str(&format!("Event: {}\n", event.event_type));
        body.push_str(&format!("Time: {}\n", event.timestamp.to_rfc3339()));
        for (key, value) in &event.details {
            body.push_str(&format!("{key}: {value}\n"));
        }

        Self { subject, body }
    }
}

/// Delivers emails for an email channel.
pub trait Mailer: Send + Sync + 'static {
    fn send(
        &self,
        channel: &EmailChannel,
        message: &EmailMessage,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Sends emails through the SMTP relay configured on the channel.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|source| Error::Address {
        address: address.to_owned(),
        source,
    })
}

impl Mailer for SmtpMailer {
    async fn send(&self, channel: &EmailChannel, message: &EmailMessage) -> Result<()> {
        if channel.recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let smtp = &channel.smtp;
        let mut builder = Message::builder()
            .from(mailbox(&smtp.from)?)
            .subject(message.subject.as_str());
        for recipient in &channel.recipients {
            builder = builder.to(mailbox(recipient)?);
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        let mut transport = match smtp.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
            }
        }
        .port(smtp.port)
        .timeout(Some(self.timeout));
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            transport =
                transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        transport.build().send(email).await?;
        log::debug!(
            "sent email for channel `{}` to {} recipient(s)",
            channel.id,
            channel.recipients.len()
        );
        Ok(())
    }
}
