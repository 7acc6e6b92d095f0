//! Public configuration routes (`config/*`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::dispatch::{ApiRequest, ApiResponse, Handler, HandlerResult};
use crate::error::ApiError;

/// Serves the whitelisted public config and the client identity config.
pub struct CoreApi {
    config: Arc<AppConfig>,
}

impl CoreApi {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Handler for CoreApi {
    async fn handle(&self, request: ApiRequest) -> HandlerResult {
        match request.path.as_str() {
            "config/core" => ApiResponse::ok(&self.config.public_config()),
            "config/firebase" => ApiResponse::ok(&self.config.client_config),
            _ => Err(ApiError::NotFound {
                available_routes: None,
            }),
        }
    }
}
