//! In-process identity backend and account store.
//!
//! Backs local development servers and tests. Id tokens are opaque random
//! strings issued by [`MemoryBackend::issue_id_token`].

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::identity::{AccountStore, DecodedToken, IdentityProvider, UserRecord};
use super::permission::PermissionSet;
use crate::error::IdentityError;

/// Default minimum password length accepted on account creation.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

/// Identity provider and account store held entirely in memory.
pub struct MemoryBackend {
    users: RwLock<HashMap<String, UserRecord>>,
    tokens: RwLock<HashMap<String, String>>,
    profiles: RwLock<HashMap<String, Value>>,
    permissions: RwLock<HashMap<String, PermissionSet>>,
    reset_url: String,
    min_password_len: usize,
}

impl MemoryBackend {
    /// `reset_url` is the page password reset links point to.
    pub fn new(reset_url: impl Into<String>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            permissions: RwLock::new(HashMap::new()),
            reset_url: reset_url.into(),
            min_password_len: MIN_PASSWORD_LEN,
        }
    }

    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    /// Issue an id token for an enabled account.
    pub async fn issue_id_token(&self, uid: &str) -> Result<String, IdentityError> {
        match self.users.read().await.get(uid) {
            Some(user) if !user.disabled => {}
            Some(_) => {
                return Err(IdentityError::Backend(format!("user {uid} is disabled")));
            }
            None => {
                return Err(IdentityError::UserNotFound {
                    uid: uid.to_string(),
                });
            }
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .write()
            .await
            .insert(token.clone(), uid.to_string());
        Ok(token)
    }

    pub async fn user(&self, uid: &str) -> Option<UserRecord> {
        self.users.read().await.get(uid).cloned()
    }

    pub async fn user_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub async fn profile(&self, uid: &str) -> Option<Value> {
        self.profiles.read().await.get(uid).cloned()
    }

    pub async fn has_permission_document(&self, uid: &str) -> bool {
        self.permissions.read().await.contains_key(uid)
    }

    async fn require_profile(&self, uid: &str) -> Result<(), IdentityError> {
        if self.profiles.read().await.contains_key(uid) {
            Ok(())
        } else {
            Err(IdentityError::UserNotFound {
                uid: uid.to_string(),
            })
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord, IdentityError> {
        if !EMAIL_PATTERN.is_match(email) {
            return Err(IdentityError::InvalidEmail {
                email: email.to_string(),
            });
        }
        if password.chars().count() < self.min_password_len {
            return Err(IdentityError::InvalidPassword {
                reason: format!("must be at least {} characters", self.min_password_len),
            });
        }

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(IdentityError::EmailAlreadyExists {
                email: email.to_string(),
            });
        }
        let record = UserRecord {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            email_verified: false,
            disabled: false,
            created_at: Utc::now(),
        };
        users.insert(record.uid.clone(), record.clone());
        tracing::debug!(uid = %record.uid, "Account created");
        Ok(record)
    }

    async fn generate_password_reset_link(&self, email: &str) -> Result<String, IdentityError> {
        if self.user_by_email(email).await.is_none() {
            return Err(IdentityError::EmailNotFound {
                email: email.to_string(),
            });
        }
        let code = Uuid::new_v4().simple();
        let separator = if self.reset_url.contains('?') { '&' } else { '?' };
        Ok(format!("{}{separator}mode=resetPassword&oobCode={code}", self.reset_url))
    }

    async fn verify_id_token(&self, token: &str) -> Result<DecodedToken, IdentityError> {
        let uid = self
            .tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)?;
        let users = self.users.read().await;
        match users.get(&uid) {
            Some(user) if !user.disabled => Ok(DecodedToken {
                uid,
                email: Some(user.email.clone()),
            }),
            _ => Err(IdentityError::InvalidToken),
        }
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<(), IdentityError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(uid).ok_or_else(|| IdentityError::UserNotFound {
            uid: uid.to_string(),
        })?;
        user.disabled = disabled;
        if disabled {
            self.tokens.write().await.retain(|_, owner| owner != uid);
        }
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<(), IdentityError> {
        self.users
            .write()
            .await
            .remove(uid)
            .ok_or_else(|| IdentityError::UserNotFound {
                uid: uid.to_string(),
            })?;
        self.tokens.write().await.retain(|_, owner| owner != uid);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryBackend {
    async fn create_profile(&self, uid: &str) -> Result<(), IdentityError> {
        self.profiles
            .write()
            .await
            .insert(uid.to_string(), serde_json::json!({}));
        Ok(())
    }

    async fn mark_profile_disabled(
        &self,
        uid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), IdentityError> {
        self.require_profile(uid).await?;
        let mut profiles = self.profiles.write().await;
        if let Some(Value::Object(profile)) = profiles.get_mut(uid) {
            profile.insert("disabled".into(), Value::Bool(true));
            profile.insert("disabledAt".into(), Value::String(at.to_rfc3339()));
        }
        Ok(())
    }

    async fn delete_profile(&self, uid: &str) -> Result<(), IdentityError> {
        self.profiles.write().await.remove(uid);
        Ok(())
    }

    async fn create_permissions(&self, uid: &str) -> Result<(), IdentityError> {
        self.permissions
            .write()
            .await
            .insert(uid.to_string(), PermissionSet::new());
        Ok(())
    }

    async fn add_permission(&self, uid: &str, key: &str) -> Result<(), IdentityError> {
        let mut permissions = self.permissions.write().await;
        let set = permissions
            .get_mut(uid)
            .ok_or_else(|| IdentityError::UserNotFound {
                uid: uid.to_string(),
            })?;
        set.grant(key);
        Ok(())
    }

    async fn remove_permission(&self, uid: &str, key: &str) -> Result<(), IdentityError> {
        if let Some(set) = self.permissions.write().await.get_mut(uid) {
            set.revoke(key);
        }
        Ok(())
    }

    async fn permissions(&self, uid: &str) -> Result<PermissionSet, IdentityError> {
        Ok(self
            .permissions
            .read()
            .await
            .get(uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_permissions(&self, uid: &str) -> Result<(), IdentityError> {
        self.permissions.write().await.remove(uid);
        Ok(())
    }
}
