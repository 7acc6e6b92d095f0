//! Axum glue: mounts a [`Dispatcher`] under a catch-all path.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use serde_json::Value;

use super::dispatcher::Dispatcher;
use super::request::{ApiRequest, ApiResponse};
use crate::error::ApiError;

/// Build a router forwarding `{mount}/{*path}` to the dispatcher.
///
/// `mount` is the URL prefix without a trailing slash, e.g. `/api/core`.
pub fn api_routes(dispatcher: Arc<Dispatcher>, mount: &str) -> Router {
    let mount = mount.trim_end_matches('/');
    Router::new()
        .route("/health", get(health))
        .route(&format!("{mount}/{{*path}}"), any(dispatch))
        .with_state(dispatcher)
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "admin-kit"
    }))
}

async fn dispatch(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return ApiResponse::from_error(
                    ApiError::BadRequest(format!("body is not valid JSON: {e}")),
                    false,
                )
                .into_response();
            }
        }
    };

    let request = ApiRequest::from_segments(method, path.split('/'))
        .with_headers(headers)
        .with_body(body);
    dispatcher.dispatch(request).await.into_response()
}
