//! SMTP delivery via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::{EmailAttachment, EmailConfig, EmailMessage, Mailer};
use crate::error::EmailError;

/// Mailer that relays through an authenticated SMTP server.
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Fill in defaults and build the lettre message.
    ///
    /// Fails before any network activity when the API key or sender is
    /// missing.
    pub fn build_message(&self, message: &EmailMessage) -> Result<Message, EmailError> {
        if self.config.api_key.is_none() {
            return Err(EmailError::NotConfigured("SENDGRID_API_KEY".into()));
        }
        let from = message
            .from
            .clone()
            .filter(|f| !f.is_empty())
            .or_else(|| self.config.from_address.clone())
            .ok_or_else(|| EmailError::NotConfigured("SENDMAIL_FROM_EMAIL".into()))?;
        let html = message.html.clone().unwrap_or_else(|| message.text.clone());
        let mut body = MultiPart::alternative_plain_html(message.text.clone(), html);
        if !message.attachments.is_empty() {
            body = with_attachments(body, &message.attachments)?;
        }

        Message::builder()
            .from(parse_mailbox(&from)?)
            .to(parse_mailbox(&message.to)?)
            .subject(message.subject.clone())
            .multipart(body)
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, EmailError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| EmailError::NotConfigured("SENDGRID_API_KEY".into()))?;
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            api_key.expose_secret().to_string(),
        );
        Ok(SmtpTransport::starttls_relay(&self.config.smtp_host)
            .map_err(|e| EmailError::SendFailed(format!("SMTP relay error: {e}")))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let email = self.build_message(&message)?;
        let transport = self.transport()?;

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| EmailError::SendFailed(format!("send task failed: {e}")))?
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Wrap the text/html alternative so inline parts sit beside it in a
/// `multipart/related` and regular files follow in a `multipart/mixed`.
fn with_attachments(
    alternative: MultiPart,
    attachments: &[EmailAttachment],
) -> Result<MultiPart, EmailError> {
    let mut related = MultiPart::related().multipart(alternative);
    let mut files = Vec::new();
    for attachment in attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| EmailError::Build(format!("{}: {e}", attachment.filename)))?;
        let content = attachment.content.clone();
        match &attachment.content_id {
            Some(id) => {
                let part = Attachment::new_inline_with_name(id.clone(), attachment.filename.clone())
                    .body(content, content_type);
                related = related.singlepart(part);
            }
            None => files.push(
                Attachment::new(attachment.filename.clone()).body(content, content_type),
            ),
        }
    }
    Ok(files
        .into_iter()
        .fold(MultiPart::mixed().multipart(related), MultiPart::singlepart))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address.parse().map_err(|e: lettre::address::AddressError| EmailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
