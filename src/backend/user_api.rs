//! Account management routes (`user/*`).

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::auth::authenticate_request;
use super::identity::{AccountStore, IdentityProvider, USER_PERMISSION, UserRecord};
use crate::dispatch::{ApiRequest, ApiResponse, Handler, HandlerResult, require_method};
use crate::email::templates::{password_reset_email, registration_confirmation_email, with_logo};
use crate::email::{EmailAttachment, EmailMessage, Mailer};
use crate::error::ApiError;

/// Callback receiving an account uid.
pub type UserHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional lifecycle callbacks.
#[derive(Clone, Default)]
pub struct UserHooks {
    /// Runs after an account and its documents are created.
    pub on_user_create: Option<UserHook>,
    /// Replaces the default disable-on-delete behavior when set.
    pub on_user_delete: Option<UserHook>,
}

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ResetBody {
    email: String,
}

/// Handles account creation, password reset, permission lookup and deletion.
pub struct UserApi {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    client_config: Value,
    hooks: UserHooks,
    logo: Option<EmailAttachment>,
}

impl UserApi {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        client_config: Value,
    ) -> Self {
        Self {
            identity,
            store,
            mailer,
            client_config,
            hooks: UserHooks::default(),
            logo: None,
        }
    }

    pub fn with_hooks(mut self, hooks: UserHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Inline logo for outgoing account emails.
    pub fn with_logo(mut self, logo: Option<EmailAttachment>) -> Self {
        self.logo = logo;
        self
    }

    fn branded(&self, message: EmailMessage) -> EmailMessage {
        match &self.logo {
            Some(logo) => with_logo(message, logo),
            None => message,
        }
    }

    /// Create the account, its profile and permission documents, and grant
    /// the base `user` permission. The confirmation email is best-effort.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord, ApiError> {
        let record = self.identity.create_user(email, password).await?;
        self.store.create_profile(&record.uid).await?;
        self.store.create_permissions(&record.uid).await?;
        self.store.add_permission(&record.uid, USER_PERMISSION).await?;

        let confirmation =
            self.branded(registration_confirmation_email(email, &record.uid, record.created_at));
        match self.mailer.send(confirmation).await {
            Ok(()) => info!(uid = %record.uid, "Registration confirmation email sent"),
            Err(e) => error!(
                uid = %record.uid,
                error = %e,
                "Failed to send registration confirmation email"
            ),
        }

        if let Some(hook) = &self.hooks.on_user_create {
            hook(&record.uid);
        }
        Ok(record)
    }

    /// Email a password reset link.
    pub async fn reset_password(&self, email: &str) -> Result<Value, ApiError> {
        let link = self.identity.generate_password_reset_link(email).await?;
        self.mailer
            .send(self.branded(password_reset_email(email, &link)))
            .await?;
        Ok(serde_json::json!({ "message": "Password reset email sent" }))
    }

    /// Disable (`disable == true`) or fully delete an account. Permissions
    /// are removed either way.
    pub async fn disable_user(&self, uid: &str, disable: bool) -> Result<(), ApiError> {
        if disable {
            self.store.mark_profile_disabled(uid, Utc::now()).await?;
        } else {
            self.store.delete_profile(uid).await?;
        }
        self.store.delete_permissions(uid).await?;
        if disable {
            self.identity.set_disabled(uid, true).await?;
        } else {
            self.identity.delete_user(uid).await?;
        }
        info!(uid = %uid, disabled = disable, "Account removed");
        Ok(())
    }
}

#[async_trait]
impl Handler for UserApi {
    async fn handle(&self, request: ApiRequest) -> HandlerResult {
        match request.path.as_str() {
            "user/create" => {
                require_method(&request, Method::POST)?;
                let body: CreateUserBody = request.json()?;
                let record = self.create_user(&body.email, &body.password).await?;
                ApiResponse::ok(&record)
            }
            "user/config/firebase" => ApiResponse::ok(&self.client_config),
            "user/reset" => {
                require_method(&request, Method::POST)?;
                let body: ResetBody = request.json()?;
                ApiResponse::ok(&self.reset_password(&body.email).await?)
            }
            "user/permission" => {
                require_method(&request, Method::POST)?;
                let token = authenticate_request(&request, self.identity.as_ref()).await?;
                let permissions = self.store.permissions(&token.uid).await?;
                ApiResponse::ok(&permissions)
            }
            "user/delete" => {
                require_method(&request, Method::POST)?;
                let token = authenticate_request(&request, self.identity.as_ref()).await?;
                match &self.hooks.on_user_delete {
                    Some(hook) => hook(&token.uid),
                    None => self.disable_user(&token.uid, true).await?,
                }
                ApiResponse::ok(&"done")
            }
            _ => Err(ApiError::NotFound {
                available_routes: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::error::EmailError;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
            if self.fail {
                return Err(EmailError::NotConfigured("SENDGRID_API_KEY".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Fixture {
        api: UserApi,
        backend: Arc<MemoryBackend>,
        mailer: Arc<RecordingMailer>,
    }

    fn fixture_with(mailer: RecordingMailer) -> Fixture {
        let backend = Arc::new(MemoryBackend::new("http://localhost/reset"));
        let mailer = Arc::new(mailer);
        let api = UserApi::new(
            backend.clone(),
            backend.clone(),
            mailer.clone(),
            json!({"projectId": "demo"}),
        );
        Fixture {
            api,
            backend,
            mailer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingMailer::default())
    }

    fn post(path: &str, body: Value) -> ApiRequest {
        ApiRequest::new(Method::POST, path).with_body(body)
    }

    #[tokio::test]
    async fn create_user_sets_up_account() {
        let fx = fixture();
        let resp = fx
            .api
            .handle(post("user/create", json!({"email": "a@b.com", "password": "secret1"})))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        let uid = resp.json_body().unwrap()["uid"].as_str().unwrap().to_string();

        assert!(fx.backend.profile(&uid).await.is_some());
        assert!(fx.backend.has_permission(&uid, USER_PERMISSION).await.unwrap());
        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
    }

    #[tokio::test]
    async fn create_user_survives_email_failure() {
        let fx = fixture_with(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let resp = fx
            .api
            .handle(post("user/create", json!({"email": "a@b.com", "password": "secret1"})))
            .await;
        assert!(resp.is_ok());
    }

    #[tokio::test]
    async fn create_user_requires_post_and_has_no_side_effect() {
        let fx = fixture();
        let req = ApiRequest::new(Method::GET, "user/create")
            .with_body(json!({"email": "a@b.com", "password": "secret1"}));
        let err = fx.api.handle(req).await.unwrap_err();
        assert!(matches!(err, ApiError::MethodNotAllowed { .. }));
        assert!(fx.backend.user_by_email("a@b.com").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let fx = fixture();
        let body = json!({"email": "a@b.com", "password": "secret1"});
        fx.api.handle(post("user/create", body.clone())).await.unwrap();
        let err = fx.api.handle(post("user/create", body)).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAccount));
    }

    #[tokio::test]
    async fn create_user_hook_fires() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let fx = fixture();
        let api = fx.api.with_hooks(UserHooks {
            on_user_create: Some(Arc::new(move |uid: &str| {
                sink.lock().unwrap().push(uid.to_string())
            })),
            on_user_delete: None,
        });
        api.handle(post("user/create", json!({"email": "a@b.com", "password": "secret1"})))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_sends_link() {
        let fx = fixture();
        fx.api.create_user("a@b.com", "secret1").await.unwrap();
        let resp = fx
            .api
            .handle(post("user/reset", json!({"email": "a@b.com"})))
            .await
            .unwrap();
        assert_eq!(resp.json_body().unwrap()["message"], "Password reset email sent");
        let sent = fx.mailer.sent.lock().unwrap();
        let reset = sent.last().unwrap();
        assert_eq!(reset.subject, "Password Reset Request");
        assert!(reset.text.contains("oobCode="));
    }

    #[tokio::test]
    async fn account_emails_carry_logo() {
        let fx = fixture();
        let logo = EmailAttachment::inline("brand.png", vec![1, 2], "image/png", "logo");
        let api = fx.api.with_logo(Some(logo.clone()));
        api.create_user("a@b.com", "secret1").await.unwrap();
        api.reset_password("a@b.com").await.unwrap();

        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for message in sent.iter() {
            assert_eq!(message.attachments, vec![logo.clone()]);
            assert!(message.html.as_deref().unwrap().contains("cid:logo"));
        }
    }

    #[tokio::test]
    async fn emails_have_no_attachments_without_logo() {
        let fx = fixture();
        fx.api.create_user("a@b.com", "secret1").await.unwrap();
        assert!(fx.mailer.sent.lock().unwrap()[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn permission_requires_bearer() {
        let fx = fixture();
        let record = fx.api.create_user("a@b.com", "secret1").await.unwrap();

        let err = fx.api.handle(post("user/permission", Value::Null)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        let token = fx.backend.issue_id_token(&record.uid).await.unwrap();
        let resp = fx
            .api
            .handle(post("user/permission", Value::Null).with_bearer(&token))
            .await
            .unwrap();
        assert_eq!(resp.json_body().unwrap(), &json!({"user": true}));
    }

    #[tokio::test]
    async fn delete_disables_account() {
        let fx = fixture();
        let record = fx.api.create_user("a@b.com", "secret1").await.unwrap();
        let token = fx.backend.issue_id_token(&record.uid).await.unwrap();

        let resp = fx
            .api
            .handle(post("user/delete", Value::Null).with_bearer(&token))
            .await
            .unwrap();
        assert_eq!(resp.json_body().unwrap(), &json!("done"));

        let user = fx.backend.user(&record.uid).await.unwrap();
        assert!(user.disabled);
        assert!(!fx.backend.has_permission_document(&record.uid).await);
        assert_eq!(fx.backend.profile(&record.uid).await.unwrap()["disabled"], true);
    }

    #[tokio::test]
    async fn delete_hook_replaces_default() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let fx = fixture();
        let backend = fx.backend.clone();
        let api = fx.api.with_hooks(UserHooks {
            on_user_create: None,
            on_user_delete: Some(Arc::new(move |uid: &str| {
                sink.lock().unwrap().push(uid.to_string())
            })),
        });
        let record = api.create_user("a@b.com", "secret1").await.unwrap();
        let token = backend.issue_id_token(&record.uid).await.unwrap();
        api.handle(post("user/delete", Value::Null).with_bearer(&token))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), [record.uid.clone()]);
        assert!(!backend.user(&record.uid).await.unwrap().disabled);
    }

    #[tokio::test]
    async fn hard_delete_removes_everything() {
        let fx = fixture();
        let record = fx.api.create_user("a@b.com", "secret1").await.unwrap();
        fx.api.disable_user(&record.uid, false).await.unwrap();
        assert!(fx.backend.user(&record.uid).await.is_none());
        assert!(fx.backend.profile(&record.uid).await.is_none());
    }

    #[tokio::test]
    async fn unknown_user_route() {
        let fx = fixture();
        let err = fx.api.handle(post("user/unknown", Value::Null)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { available_routes: None }));
    }

    #[tokio::test]
    async fn client_config_route() {
        let fx = fixture();
        let resp = fx
            .api
            .handle(ApiRequest::new(Method::GET, "user/config/firebase"))
            .await
            .unwrap();
        assert_eq!(resp.json_body().unwrap()["projectId"], "demo");
    }
}
