//! Route keys: the matching primitive behind the route table.

use std::fmt;

/// A key an inbound logical path is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteKey {
    /// Matches only the identical path.
    Exact(String),
    /// Matches any path starting with the key.
    Prefix(String),
}

impl RouteKey {
    pub fn exact(key: impl Into<String>) -> Self {
        Self::Exact(key.into())
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        Self::Prefix(key.into())
    }

    /// Whether `path` is routed to this key.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(key) => path == key,
            Self::Prefix(key) => path.starts_with(key.as_str()),
        }
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(key) | Self::Prefix(key) => key,
        }
    }

    /// True when every path matched by `later` is already matched by `self`,
    /// making `later` unreachable if registered after `self`.
    pub fn shadows(&self, later: &RouteKey) -> bool {
        match (self, later) {
            (Self::Prefix(p), Self::Exact(k)) | (Self::Prefix(p), Self::Prefix(k)) => {
                k.starts_with(p.as_str())
            }
            (Self::Exact(e), Self::Exact(k)) => e == k,
            // An exact key never covers the open-ended set a prefix matches.
            (Self::Exact(_), Self::Prefix(_)) => false,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
