//! Identity and account-store abstractions the route handlers call into.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::PermissionSet;
use crate::error::IdentityError;

/// Permission granted to every newly created account.
pub const USER_PERMISSION: &str = "user";

/// An account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedToken {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authentication backend: account lifecycle and token verification.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. Fails with `EmailAlreadyExists` on collision.
    async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord, IdentityError>;

    /// Produce a one-time password reset link for `email`.
    async fn generate_password_reset_link(&self, email: &str) -> Result<String, IdentityError>;

    /// Verify a bearer id token.
    async fn verify_id_token(&self, token: &str) -> Result<DecodedToken, IdentityError>;

    /// Disable or re-enable sign-in for an account.
    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<(), IdentityError>;

    /// Remove an account entirely.
    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError>;
}

/// Document store holding user profiles and permission sets.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an empty profile document.
    async fn create_profile(&self, uid: &str) -> Result<(), IdentityError>;

    /// Flag a profile as disabled at `at`.
    async fn mark_profile_disabled(&self, uid: &str, at: DateTime<Utc>)
    -> Result<(), IdentityError>;

    async fn delete_profile(&self, uid: &str) -> Result<(), IdentityError>;

    /// Create an empty permission document.
    async fn create_permissions(&self, uid: &str) -> Result<(), IdentityError>;

    async fn add_permission(&self, uid: &str, key: &str) -> Result<(), IdentityError>;

    async fn remove_permission(&self, uid: &str, key: &str) -> Result<(), IdentityError>;

    /// Permission set for `uid`; empty when no document exists.
    async fn permissions(&self, uid: &str) -> Result<PermissionSet, IdentityError>;

    /// Remove the whole permission document.
    async fn delete_permissions(&self, uid: &str) -> Result<(), IdentityError>;

    async fn has_permission(&self, uid: &str, key: &str) -> Result<bool, IdentityError> {
        Ok(self.permissions(uid).await?.grants(key))
    }
}
