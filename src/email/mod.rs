//! Outbound email: account notifications sent through an SMTP relay.

pub mod smtp;
pub mod templates;

use std::path::Path;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::ConfigSource;
use crate::error::{ConfigError, EmailError};

pub use smtp::SmtpMailer;

/// Default relay host (SendGrid's SMTP endpoint).
pub const DEFAULT_SMTP_HOST: &str = "smtp.sendgrid.net";
/// Username SendGrid expects when authenticating with an API key.
pub const API_KEY_USERNAME: &str = "apikey";

/// Email configuration, built from the layered config source.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// API key used as the SMTP password. `None` disables sending.
    pub api_key: Option<SecretString>,
    /// Default sender when a message carries none.
    pub from_address: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// Inline logo added to account emails, read from `EMAIL_LOGO_PATH`.
    pub logo: Option<EmailAttachment>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_address: None,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: 587,
            smtp_username: API_KEY_USERNAME.to_string(),
            logo: None,
        }
    }
}

impl EmailConfig {
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_key: source
                .get_string("SENDGRID_API_KEY")
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            from_address: source
                .get_string("SENDMAIL_FROM_EMAIL")
                .filter(|a| !a.is_empty()),
            smtp_host: source.get_string("SMTP_HOST").unwrap_or(defaults.smtp_host),
            smtp_port: source.get_parsed("SMTP_PORT")?.unwrap_or(defaults.smtp_port),
            smtp_username: source
                .get_string("SMTP_USERNAME")
                .unwrap_or(defaults.smtp_username),
            logo: source
                .get_string("EMAIL_LOGO_PATH")
                .filter(|p| !p.is_empty())
                .and_then(|path| load_logo(Path::new(&path))),
        })
    }
}

fn load_logo(path: &Path) -> Option<EmailAttachment> {
    match EmailAttachment::inline_from_file(path, templates::LOGO_CONTENT_ID) {
        Ok(logo) => Some(logo),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Email logo unavailable");
            None
        }
    }
}

/// A file carried by an [`EmailMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    /// Set for inline parts, which HTML references as `cid:<content_id>`.
    pub content_id: Option<String>,
}

impl EmailAttachment {
    pub fn file(
        filename: impl Into<String>,
        content: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content,
            content_type: content_type.into(),
            content_id: None,
        }
    }

    pub fn inline(
        filename: impl Into<String>,
        content: Vec<u8>,
        content_type: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Self {
        Self {
            content_id: Some(content_id.into()),
            ..Self::file(filename, content, content_type)
        }
    }

    /// Read an image from disk as an inline part. The MIME type comes from
    /// the file extension.
    pub fn inline_from_file(path: &Path, content_id: &str) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| content_id.to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        };
        Ok(Self::inline(filename, content, content_type, content_id))
    }

    pub fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }
}

/// A message ready to be handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    /// Falls back to the configured sender when `None`.
    pub from: Option<String>,
    pub subject: String,
    pub text: String,
    /// Falls back to `text` when `None`.
    pub html: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

/// Sends email on behalf of the account handlers.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}
