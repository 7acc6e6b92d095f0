//! Bodies for account notification emails.

use chrono::{DateTime, Utc};

use super::{EmailAttachment, EmailMessage};

/// Content id account emails use to reference their inline logo.
pub const LOGO_CONTENT_ID: &str = "logo";

/// Put `logo` at the top of the HTML body and attach it inline.
pub fn with_logo(mut message: EmailMessage, logo: &EmailAttachment) -> EmailMessage {
    let id = logo.content_id.as_deref().unwrap_or(LOGO_CONTENT_ID);
    let html = message.html.take().unwrap_or_else(|| message.text.clone());
    message.html = Some(format!(
        "<img src=\"cid:{id}\" alt=\"logo\" \
         style=\"width: 150px; height: auto; display: block; margin: 0 auto 20px;\" />{html}"
    ));
    message.attachments.push(EmailAttachment {
        content_id: Some(id.to_string()),
        ..logo.clone()
    });
    message
}

/// Password reset notice carrying the reset link.
pub fn password_reset_email(to: &str, reset_link: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        from: None,
        subject: "Password Reset Request".to_string(),
        text: format!(
            "Hello, you requested a password reset. Click the link to reset your password: {reset_link}"
        ),
        html: Some(format!(
            "<p>Hello,</p>\
             <p>You requested a password reset. Please click the link below to reset your password:</p>\
             <a href=\"{reset_link}\">Reset Password</a>\
             <p>If you did not request this, please ignore this email.</p>"
        )),
        attachments: Vec::new(),
    }
}

/// Welcome message sent after an account is created.
pub fn registration_confirmation_email(
    to: &str,
    uid: &str,
    created_at: DateTime<Utc>,
) -> EmailMessage {
    let created = created_at.format("%Y-%m-%d");
    EmailMessage {
        to: to.to_string(),
        from: None,
        subject: "Registration Confirmed".to_string(),
        text: format!(
            "Welcome! Your account has been successfully created. \
             Account Details: Email: {to}, Account ID: {uid}, Created: {created}."
        ),
        html: Some(format!(
            "<h2>Welcome!</h2>\
             <p>Your account has been successfully created and is ready to use.</p>\
             <p><strong>Email:</strong> {to}</p>\
             <p><strong>Account ID:</strong> {uid}</p>\
             <p><strong>Created:</strong> {created}</p>"
        )),
        attachments: Vec::new(),
    }
}
