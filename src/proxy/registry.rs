//! Resource proxy: one data-access surface over per-resource backends.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::resource::{PlaceholderBackend, ResourceBackend, ResourceRequest, ResourceResponse};
use crate::error::ProxyError;

/// Callback receiving the resource name of every proxied call.
pub type AccessObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// What the proxy does when a call names an unregistered resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingResource {
    /// Log and return [`ResourceResponse::Null`].
    #[default]
    Degrade,
    /// Forward to a [`PlaceholderBackend`].
    Placeholder,
    /// Fail with [`ProxyError::MisconfiguredResource`].
    Reject,
}

/// Registry of resource backends.
pub struct ResourceProxy {
    backends: RwLock<HashMap<String, Arc<dyn ResourceBackend>>>,
    observer: Option<AccessObserver>,
    missing: MissingResource,
}

impl ResourceProxy {
    /// Create an empty proxy with the default missing-resource policy.
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            observer: None,
            missing: MissingResource::default(),
        }
    }

    pub fn with_missing_policy(mut self, policy: MissingResource) -> Self {
        self.missing = policy;
        self
    }

    /// Install the access observer.
    pub fn on_access(mut self, observer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Register a backend. A later registration for the same name replaces
    /// the earlier one, which is returned.
    pub async fn register(
        &self,
        resource: impl Into<String>,
        backend: Arc<dyn ResourceBackend>,
    ) -> Option<Arc<dyn ResourceBackend>> {
        let resource = resource.into();
        let previous = self.backends.write().await.insert(resource.clone(), backend);
        if previous.is_some() {
            tracing::debug!(resource = %resource, "Replaced resource backend");
        } else {
            tracing::debug!(resource = %resource, "Registered resource backend");
        }
        previous
    }

    /// Unregister a backend.
    pub async fn unregister(&self, resource: &str) -> Option<Arc<dyn ResourceBackend>> {
        self.backends.write().await.remove(resource)
    }

    /// Check if a resource has a backend.
    pub async fn has(&self, resource: &str) -> bool {
        self.backends.read().await.contains_key(resource)
    }

    /// Registered resource names, sorted.
    pub async fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Notify the observer, then forward `request` unchanged to the
    /// resource's backend.
    pub async fn invoke(
        &self,
        resource: &str,
        request: ResourceRequest,
    ) -> Result<ResourceResponse, ProxyError> {
        if let Some(observer) = &self.observer {
            observer(resource);
        }

        // Clone the Arc so the lock is released before the backend runs.
        let backend = self.backends.read().await.get(resource).cloned();
        match backend {
            Some(backend) => backend.handle(resource, request).await,
            None => self.missing_resource(resource, request).await,
        }
    }

    async fn missing_resource(
        &self,
        resource: &str,
        request: ResourceRequest,
    ) -> Result<ResourceResponse, ProxyError> {
        let operation = request.operation();
        match self.missing {
            MissingResource::Degrade => {
                tracing::error!(
                    resource = %resource,
                    operation = %operation,
                    "No data provider registered for resource"
                );
                Ok(ResourceResponse::Null)
            }
            MissingResource::Placeholder => {
                tracing::warn!(
                    resource = %resource,
                    operation = %operation,
                    "Serving placeholder result for unregistered resource"
                );
                PlaceholderBackend.handle(resource, request).await
            }
            MissingResource::Reject => Err(ProxyError::MisconfiguredResource {
                resource: resource.to_string(),
            }),
        }
    }
}

impl Default for ResourceProxy {
    fn default() -> Self {
        Self::new()
    }
}
