//! Client side of the account endpoints, used by onboarding flows.
//!
//! [`DispatcherAccountApi`] calls a [`Dispatcher`] in-process;
//! [`HttpAccountApi`] goes over HTTP to a running server.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::backend::{PermissionSet, UserRecord};
use crate::config::build_api_url;
use crate::dispatch::{ApiRequest, Dispatcher, ResponseBody};
use crate::error::AccountError;

/// Mount point of the account API below the base path.
pub const API_MOUNT: &str = "api/core";

/// Account operations a flow can request.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AccountError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), AccountError>;

    async fn permissions(&self, id_token: &str) -> Result<PermissionSet, AccountError>;

    async fn delete_account(&self, id_token: &str) -> Result<(), AccountError>;
}

/// Calls the dispatcher directly.
pub struct DispatcherAccountApi {
    dispatcher: Arc<Dispatcher>,
}

impl DispatcherAccountApi {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        id_token: Option<&str>,
    ) -> Result<T, AccountError> {
        let mut request = ApiRequest::new(Method::POST, path).with_body(body);
        if let Some(token) = id_token {
            request = request.with_bearer(token);
        }
        let response = self.dispatcher.dispatch(request).await;
        let body = match response.body {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
            ResponseBody::Empty => Value::Null,
        };
        decode(path, response.status.as_u16(), body)
    }
}

#[async_trait]
impl AccountApi for DispatcherAccountApi {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AccountError> {
        self.post("user/create", json!({ "email": email, "password": password }), None)
            .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        self.post::<Value>("user/reset", json!({ "email": email }), None)
            .await
            .map(|_| ())
    }

    async fn permissions(&self, id_token: &str) -> Result<PermissionSet, AccountError> {
        self.post("user/permission", Value::Null, Some(id_token)).await
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), AccountError> {
        self.post::<Value>("user/delete", Value::Null, Some(id_token))
            .await
            .map(|_| ())
    }
}

/// Calls a running server over HTTP.
pub struct HttpAccountApi {
    client: reqwest::Client,
    origin: String,
    base_path: String,
}

impl HttpAccountApi {
    /// `origin` is scheme and authority (`http://host:port`); `base_path` is
    /// the server's `BASE_PATH`.
    pub fn new(origin: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), origin, base_path)
    }

    pub fn with_client(
        client: reqwest::Client,
        origin: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
            base_path: base_path.into(),
        }
    }

    /// Full URL for an endpoint such as `user/create`.
    pub fn url(&self, path: &str) -> String {
        let endpoint = format!("{API_MOUNT}/{path}");
        format!("{}{}", self.origin, build_api_url(&self.base_path, &endpoint))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        id_token: Option<&str>,
    ) -> Result<T, AccountError> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(token) = id_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AccountError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AccountError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        decode(path, status, body)
    }
}

#[async_trait]
impl AccountApi for HttpAccountApi {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AccountError> {
        self.post(
            "user/create",
            Some(json!({ "email": email, "password": password })),
            None,
        )
        .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        self.post::<Value>("user/reset", Some(json!({ "email": email })), None)
            .await
            .map(|_| ())
    }

    async fn permissions(&self, id_token: &str) -> Result<PermissionSet, AccountError> {
        self.post("user/permission", None, Some(id_token)).await
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), AccountError> {
        self.post::<Value>("user/delete", None, Some(id_token))
            .await
            .map(|_| ())
    }
}

/// Turn a status and body into the typed result. Non-2xx statuses become
/// [`AccountError::Rejected`] carrying the server's error message.
fn decode<T: DeserializeOwned>(path: &str, status: u16, body: Value) -> Result<T, AccountError> {
    if !(200..300).contains(&status) {
        let message = match &body {
            Value::Object(map) => map
                .get("error")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| body.to_string()),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(AccountError::Rejected {
            path: path.to_string(),
            status,
            message,
        });
    }
    serde_json::from_value(body).map_err(|e| AccountError::InvalidResponse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Services, UserHooks, api_dispatcher};
    use crate::config::{AppConfig, ConfigSource};
    use crate::email::{EmailConfig, SmtpMailer};

    fn setup() -> (DispatcherAccountApi, Arc<MemoryBackend>) {
        let config = AppConfig::from_source(ConfigSource::default(), json!({})).unwrap();
        let backend = Arc::new(MemoryBackend::new("http://localhost/reset"));
        let services = Services {
            identity: backend.clone(),
            store: backend.clone(),
            mailer: Arc::new(SmtpMailer::new(EmailConfig::default())),
            hooks: UserHooks::default(),
        };
        let dispatcher = api_dispatcher(Arc::new(config), services).unwrap();
        (DispatcherAccountApi::new(Arc::new(dispatcher)), backend)
    }

    #[tokio::test]
    async fn create_and_query_permissions() {
        let (api, backend) = setup();
        let record = api.create_account("a@b.com", "secret1").await.unwrap();
        assert_eq!(record.email, "a@b.com");

        let token = backend.issue_id_token(&record.uid).await.unwrap();
        let permissions = api.permissions(&token).await.unwrap();
        assert!(permissions.grants("user"));

        api.delete_account(&token).await.unwrap();
        assert!(backend.user(&record.uid).await.unwrap().disabled);
    }

    #[tokio::test]
    async fn duplicate_is_rejected_with_message() {
        let (api, _) = setup();
        api.create_account("a@b.com", "secret1").await.unwrap();
        let err = api.create_account("a@b.com", "secret1").await.unwrap_err();
        match err {
            AccountError::Rejected {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_token_is_unauthorized() {
        let (api, _) = setup();
        let err = api.permissions("nope").await.unwrap_err();
        assert!(matches!(err, AccountError::Rejected { status: 401, .. }));
    }

    #[test]
    fn http_urls_include_base_path() {
        let api = HttpAccountApi::new("http://localhost:8080/", "/admin");
        assert_eq!(
            api.url("user/create"),
            "http://localhost:8080/admin/api/core/user/create"
        );
        let api = HttpAccountApi::new("http://localhost:8080", "");
        assert_eq!(api.url("user/reset"), "http://localhost:8080/api/core/user/reset");
    }

    #[test]
    fn decode_text_error() {
        let err = decode::<Value>("user/create", 405, Value::String("Method GET Not Allowed".into()))
            .unwrap_err();
        assert!(err.to_string().contains("Method GET Not Allowed"));
    }
}
