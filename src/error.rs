//! Error types for admin-kit.

use axum::http::Method;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by route handlers and the dispatcher.
///
/// Each variant maps to exactly one HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `available_routes` is only populated by the dispatcher itself.
    #[error("Route not found")]
    NotFound { available_routes: Option<Vec<String>> },

    #[error("Method {method} Not Allowed")]
    MethodNotAllowed { method: Method, allowed: Method },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("No backing provider for resource {resource}")]
    MisconfiguredResource { resource: String },

    #[error(
        "An account with this email already exists. Please use a different email or try logging in."
    )]
    DuplicateAccount,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

/// Identity provider errors (account creation, token verification).
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Email already exists: {email}")]
    EmailAlreadyExists { email: String },

    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("Invalid password: {reason}")]
    InvalidPassword { reason: String },

    #[error("User not found: {uid}")]
    UserNotFound { uid: String },

    #[error("No user registered for email {email}")]
    EmailNotFound { email: String },

    #[error("Invalid or expired id token")]
    InvalidToken,

    #[error("Identity backend failure: {0}")]
    Backend(String),
}

/// Outbound email errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("{0} is not set")]
    NotConfigured(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    SendFailed(String),
}

/// Onboarding step sequence errors.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Step sequence must contain at least one step")]
    Empty,

    #[error("Duplicate step name: {name}")]
    DuplicateName { name: String },
}

/// Resource proxy errors.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No backing provider registered for resource {resource}")]
    MisconfiguredResource { resource: String },

    #[error("{operation} rejected for resource {resource}")]
    Rejected { operation: String, resource: String },

    #[error("Backend for {resource} failed: {reason}")]
    Backend { resource: String, reason: String },
}

/// Errors from calling the account endpoints on behalf of a flow.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Request to {path} failed with status {status}: {message}")]
    Rejected {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response from {path}: {reason}")]
    InvalidResponse { path: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::EmailAlreadyExists { .. } => ApiError::DuplicateAccount,
            IdentityError::InvalidEmail { .. } | IdentityError::InvalidPassword { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            IdentityError::InvalidToken => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EmailError> for ApiError {
    fn from(e: EmailError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::MisconfiguredResource { resource } => {
                ApiError::MisconfiguredResource { resource }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
