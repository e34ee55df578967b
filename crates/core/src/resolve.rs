//! The resolution seam between the cache and the network.
//!
//! The cache only knows the [`Resolve`] trait, so the HTTP-backed resolver
//! lives in the client crate and tests can substitute a counting stub.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Domain;

/// Outcome of resolving a domain: a validated image URL, or nothing.
///
/// The stored form is the URL text, with the empty string standing for
/// "no avatar found, use the fallback provider".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedUrl(String);

impl ResolvedUrl {
    /// A validated, reachable image URL.
    ///
    /// An empty string yields the not-found value.
    pub fn found(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The "no avatar" sentinel.
    pub fn not_found() -> Self {
        Self(String::new())
    }

    /// Rebuild a value from its stored text.
    pub fn from_stored(text: &str) -> Self {
        Self(text.to_string())
    }

    /// The stored text, empty for not-found.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL, if one was found.
    pub fn url(&self) -> Option<&str> {
        if self.0.is_empty() { None } else { Some(&self.0) }
    }

    pub fn is_found(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves a domain to its best avatar URL.
///
/// Implementations never fail: every network problem degrades to
/// [`ResolvedUrl::not_found`].
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, domain: &Domain) -> ResolvedUrl;
}
