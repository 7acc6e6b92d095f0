//! Dispatcher: selects one handler per request and translates failures.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use super::request::{ApiRequest, ApiResponse};
use super::table::RouteTable;
use crate::error::ApiError;

/// Dispatcher behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Include internal error detail in `500` responses.
    pub dev_mode: bool,
    /// List the registered route keys in `404` responses.
    pub expose_routes: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            dev_mode: false,
            expose_routes: true,
        }
    }
}

/// Routes requests through an immutable [`RouteTable`].
pub struct Dispatcher {
    table: RouteTable,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(table: RouteTable, options: DispatchOptions) -> Self {
        Self { table, options }
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Registered route keys in match order.
    pub fn routes(&self) -> Vec<String> {
        self.table.keys()
    }

    /// Route a request and always produce a response.
    ///
    /// Handler errors and panics are converted at this boundary; nothing
    /// propagates to the transport.
    pub async fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        let path = request.path.clone();
        let Some((key, handler)) = self.table.resolve(&path) else {
            debug!(path = %path, "No route matched");
            let available_routes = self.options.expose_routes.then(|| self.table.keys());
            return ApiResponse::from_error(ApiError::NotFound { available_routes }, false);
        };
        let handler = Arc::clone(handler);
        debug!(path = %path, route = %key, method = %request.method, "Dispatching request");

        match AssertUnwindSafe(handler.handle(request)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.error_response(&path, e),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                self.error_response(&path, ApiError::Internal(detail))
            }
        }
    }

    fn error_response(&self, path: &str, error: ApiError) -> ApiResponse {
        match &error {
            ApiError::Internal(detail) => {
                error!(path = %path, error = %detail, "API handler failed");
            }
            ApiError::DuplicateAccount | ApiError::MisconfiguredResource { .. } => {
                warn!(path = %path, error = %error, "API request rejected");
            }
            _ => debug!(path = %path, error = %error, "API request rejected"),
        }
        ApiResponse::from_error(error, self.options.dev_mode)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::request::{GENERIC_INTERNAL_ERROR, require_method};
    use axum::http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_handler(
        tag: &'static str,
    ) -> impl Fn(ApiRequest) -> futures::future::Ready<crate::dispatch::HandlerResult>
    + Send
    + Sync
    + 'static {
        move |_req| {
            futures::future::ready(Ok(ApiResponse::json(
                StatusCode::OK,
                serde_json::json!({ "tag": tag }),
            )))
        }
    }

    #[tokio::test]
    async fn unmatched_path_lists_routes() {
        let table = RouteTable::builder()
            .exact("user/create", ok_handler("create"))
            .exact("user/reset", ok_handler("reset"))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(table, DispatchOptions::default());

        let resp = dispatcher
            .dispatch(ApiRequest::new(Method::GET, "unknown/path"))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let body = resp.json_body().unwrap();
        assert_eq!(body["error"], "Route not found");
        assert_eq!(
            body["availableRoutes"],
            serde_json::json!(["user/create", "user/reset"])
        );
    }

    #[tokio::test]
    async fn route_listing_can_be_hidden() {
        let table = RouteTable::builder()
            .exact("user/create", ok_handler("create"))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(
            table,
            DispatchOptions {
                dev_mode: false,
                expose_routes: false,
            },
        );
        let resp = dispatcher.dispatch(ApiRequest::new(Method::GET, "nope")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.json_body().unwrap().get("availableRoutes").is_none());
    }

    #[tokio::test]
    async fn method_gate_runs_before_side_effect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let table = RouteTable::builder()
            .exact("user/create", move |req: ApiRequest| {
                let counter = Arc::clone(&counter);
                async move {
                    require_method(&req, Method::POST)?;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(ApiResponse::json(StatusCode::OK, serde_json::json!({})))
                }
            })
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(table, DispatchOptions::default());

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let resp = dispatcher
                .dispatch(ApiRequest::new(method, "user/create"))
                .await;
            assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let resp = dispatcher
            .dispatch(ApiRequest::new(Method::POST, "user/create"))
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_errors_are_translated() {
        let table = RouteTable::builder()
            .exact("boom", |_req: ApiRequest| async {
                Err::<ApiResponse, _>(ApiError::Internal("connection refused".into()))
            })
            .build()
            .unwrap();

        let prod = Dispatcher::new(table, DispatchOptions::default());
        let resp = prod.dispatch(ApiRequest::new(Method::GET, "boom")).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.json_body().unwrap()["error"], GENERIC_INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let table = RouteTable::builder()
            .exact("panic", |_req: ApiRequest| async {
                if true {
                    panic!("handler blew up");
                }
                Ok::<_, ApiError>(ApiResponse::json(StatusCode::OK, serde_json::json!({})))
            })
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(
            table,
            DispatchOptions {
                dev_mode: true,
                expose_routes: true,
            },
        );
        let resp = dispatcher.dispatch(ApiRequest::new(Method::GET, "panic")).await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.json_body().unwrap()["error"], "handler blew up");
    }

    #[tokio::test]
    async fn dispatch_picks_first_prefix_in_registration_order() {
        let table = RouteTable::builder()
            .prefix("user", ok_handler("user"))
            .prefix("user/config", ok_handler("user-config"))
            .prefix("config", ok_handler("config"))
            .build()
            .unwrap();
        let dispatcher = Dispatcher::new(table, DispatchOptions::default());

        for (path, expected) in [
            ("user/config/firebase", "user"),
            ("user/create", "user"),
            ("config/core", "config"),
        ] {
            let resp = dispatcher.dispatch(ApiRequest::new(Method::GET, path)).await;
            assert_eq!(resp.json_body().unwrap()["tag"], expected, "path {path}");
        }
    }
}
