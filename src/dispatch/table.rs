//! Handler table: the ordered mapping from route keys to handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::request::{ApiRequest, ApiResponse};
use super::route::RouteKey;
use crate::error::{ApiError, ConfigError};

/// Outcome of a handler invocation.
pub type HandlerResult = Result<ApiResponse, ApiError>;

/// An async request handler bound to a route key.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, request: ApiRequest) -> HandlerResult {
        (self)(request).await
    }
}

struct Route {
    key: RouteKey,
    handler: Arc<dyn Handler>,
}

/// Immutable, ordered route table. Lookup returns the first registered key
/// that matches.
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// First route (in registration order) whose key matches `path`.
    pub fn resolve(&self, path: &str) -> Option<(&RouteKey, &Arc<dyn Handler>)> {
        self.routes
            .iter()
            .find(|route| route.key.matches(path))
            .map(|route| (&route.key, &route.handler))
    }

    /// Route keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.key.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes, then validates them into a [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(mut self, key: RouteKey, handler: Arc<dyn Handler>) -> Self {
        self.routes.push(Route { key, handler });
        self
    }

    pub fn exact(self, key: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(RouteKey::exact(key), Arc::new(handler))
    }

    pub fn prefix(self, key: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(RouteKey::prefix(key), Arc::new(handler))
    }

    /// Pairs `(later, earlier)` where `later` can never be reached because
    /// `earlier` is registered first and matches everything it does.
    pub fn shadowed(&self) -> Vec<(RouteKey, RouteKey)> {
        let mut shadowed = Vec::new();
        for (i, later) in self.routes.iter().enumerate() {
            if let Some(earlier) = self.routes[..i]
                .iter()
                .find(|earlier| earlier.key.shadows(&later.key))
            {
                shadowed.push((later.key.clone(), earlier.key.clone()));
            }
        }
        shadowed
    }

    /// Build the table. Duplicate keys are rejected; shadowed keys are kept
    /// but logged, since registration order decides the winner.
    pub fn build(self) -> Result<RouteTable, ConfigError> {
        for (i, route) in self.routes.iter().enumerate() {
            if self.routes[..i].iter().any(|r| r.key == route.key) {
                return Err(ConfigError::InvalidValue {
                    key: "routes".into(),
                    message: format!("duplicate route key: {}", route.key),
                });
            }
        }
        for (later, earlier) in self.shadowed() {
            tracing::warn!(
                route = %later,
                shadowed_by = %earlier,
                "Route is unreachable: an earlier prefix matches every path it would"
            );
        }
        Ok(RouteTable {
            routes: self.routes,
        })
    }
}
