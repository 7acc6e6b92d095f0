//! Transport-neutral request and response types used by route handlers.

use axum::Json;
use axum::http::header::{ALLOW, AUTHORIZATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Generic message returned in place of internal error detail.
pub const GENERIC_INTERNAL_ERROR: &str = "Internal server error";

/// An inbound API request addressed by its logical path (`user/create`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the request had none.
    pub body: Value,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Value::Null,
        }
    }

    /// Rebuild the logical path by joining non-empty segments with `/`.
    pub fn from_segments<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = segments
            .into_iter()
            .filter(|s| !s.as_ref().is_empty())
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(method, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attach an `Authorization: Bearer <token>` header.
    pub fn with_bearer(mut self, token: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// The bearer credential, if the request carries one.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
    }

    /// Deserialize the body, mapping failures to `BadRequest`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
    }
}

/// Reject the request unless it uses `allowed`.
///
/// Handlers call this before performing any side effect.
pub fn require_method(request: &ApiRequest, allowed: Method) -> Result<(), ApiError> {
    if request.method == allowed {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed {
            method: request.method.clone(),
            allowed,
        })
    }
}

/// Response body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

/// A handler's response before it is rendered onto the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Json(body),
        }
    }

    /// `200` with a serialized body.
    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Internal(format!("failed to serialize response: {e}")))?;
        Ok(Self::json(StatusCode::OK, value))
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Text(body.into()),
        }
    }

    /// Render an error. Internal detail is only included when
    /// `expose_detail` is set.
    pub fn from_error(error: ApiError, expose_detail: bool) -> Self {
        match error {
            ApiError::NotFound { available_routes } => {
                let mut body = serde_json::json!({ "error": "Route not found" });
                if let Some(routes) = available_routes {
                    body["availableRoutes"] = serde_json::json!(routes);
                }
                Self::json(StatusCode::NOT_FOUND, body)
            }
            ApiError::MethodNotAllowed { ref allowed, .. } => {
                let mut response = Self::text(StatusCode::METHOD_NOT_ALLOWED, error.to_string());
                if let Ok(value) = HeaderValue::from_str(allowed.as_str()) {
                    response.headers.insert(ALLOW, value);
                }
                response
            }
            ApiError::Unauthorized => error_json(StatusCode::UNAUTHORIZED, error.to_string()),
            ApiError::BadRequest(_) => error_json(StatusCode::BAD_REQUEST, error.to_string()),
            ApiError::DuplicateAccount | ApiError::MisconfiguredResource { .. } => {
                error_json(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            ApiError::Internal(detail) => {
                let message = if expose_detail {
                    detail
                } else {
                    GENERIC_INTERNAL_ERROR.to_string()
                };
                error_json(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }

    /// The JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

fn error_json(status: StatusCode, message: String) -> ApiResponse {
    ApiResponse::json(status, serde_json::json!({ "error": message }))
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
            ResponseBody::Text(text) => (self.status, text).into_response(),
            ResponseBody::Empty => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}
