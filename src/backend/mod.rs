//! Route handlers for the account and config API, plus the identity and
//! account-store seams they run against.

pub mod auth;
pub mod core_api;
pub mod identity;
pub mod memory;
pub mod permission;
pub mod user_api;

use std::sync::Arc;

pub use core_api::CoreApi;
pub use identity::{AccountStore, DecodedToken, IdentityProvider, USER_PERMISSION, UserRecord};
pub use memory::MemoryBackend;
pub use permission::PermissionSet;
pub use user_api::{UserApi, UserHook, UserHooks};

use crate::config::AppConfig;
use crate::dispatch::{DispatchOptions, Dispatcher, RouteTable};
use crate::email::Mailer;
use crate::error::ConfigError;

/// Services the standard handlers depend on.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn AccountStore>,
    pub mailer: Arc<dyn Mailer>,
    pub hooks: UserHooks,
}

/// Build the standard table: `config` then `user`, both prefix keys.
pub fn standard_routes(
    config: Arc<AppConfig>,
    services: Services,
) -> Result<RouteTable, ConfigError> {
    let user_api = UserApi::new(
        services.identity,
        services.store,
        services.mailer,
        config.client_config.clone(),
    )
    .with_hooks(services.hooks)
    .with_logo(config.email.logo.clone());

    RouteTable::builder()
        .prefix("config", CoreApi::new(config))
        .prefix("user", user_api)
        .build()
}

/// Standard dispatcher. Route listings and error detail follow `dev_mode`.
pub fn api_dispatcher(
    config: Arc<AppConfig>,
    services: Services,
) -> Result<Dispatcher, ConfigError> {
    let options = DispatchOptions {
        dev_mode: config.dev_mode,
        expose_routes: config.dev_mode,
    };
    let table = standard_routes(config, services)?;
    Ok(Dispatcher::new(table, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::dispatch::ApiRequest;
    use crate::email::{EmailConfig, SmtpMailer};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::collections::HashMap;

    fn dispatcher(dev: bool) -> Dispatcher {
        let mut env = HashMap::new();
        if dev {
            env.insert("APP_ENV".to_string(), "development".to_string());
        }
        let config = AppConfig::from_source(
            ConfigSource::new(env, Default::default()),
            json!({"projectId": "demo"}),
        )
        .unwrap();
        let backend = Arc::new(MemoryBackend::new("http://localhost/reset"));
        let services = Services {
            identity: backend.clone(),
            store: backend,
            mailer: Arc::new(SmtpMailer::new(EmailConfig::default())),
            hooks: UserHooks::default(),
        };
        api_dispatcher(Arc::new(config), services).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_lists_keys_in_dev() {
        let resp = dispatcher(true)
            .dispatch(ApiRequest::new(Method::GET, "unknown"))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let body = resp.json_body().unwrap();
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["availableRoutes"], json!(["config", "user"]));
    }

    #[tokio::test]
    async fn unknown_route_hides_keys_in_production() {
        let resp = dispatcher(false)
            .dispatch(ApiRequest::new(Method::GET, "unknown"))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.json_body().unwrap().get("availableRoutes").is_none());
    }

    #[tokio::test]
    async fn user_create_without_mail_still_succeeds() {
        let resp = dispatcher(false)
            .dispatch(
                ApiRequest::new(Method::POST, "user/create")
                    .with_body(json!({"email": "a@b.com", "password": "secret1"})),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json_body().unwrap()["email"], "a@b.com");
    }

    #[tokio::test]
    async fn reset_without_mail_is_internal_error() {
        let d = dispatcher(false);
        d.dispatch(
            ApiRequest::new(Method::POST, "user/create")
                .with_body(json!({"email": "a@b.com", "password": "secret1"})),
        )
        .await;
        let resp = d
            .dispatch(ApiRequest::new(Method::POST, "user/reset").with_body(json!({"email": "a@b.com"})))
            .await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.json_body().unwrap()["error"], "Internal server error");
    }
}
