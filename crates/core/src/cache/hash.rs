//! Sharded cache key generation.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::Domain;

/// Hex-encoded SHA-256 of a domain name.
pub fn domain_digest(domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage key of one domain's cache entry.
///
/// Entries are spread over a two-level namespace taken from the first four
/// hex characters of the domain digest, which bounds the number of entries
/// in any one directory. The leaf is the domain itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    domain: String,
    digest: String,
}

impl EntryKey {
    pub fn for_domain(domain: &Domain) -> Self {
        Self { domain: domain.as_str().to_string(), digest: domain_digest(domain.as_str()) }
    }

    /// The domain this key belongs to; also the leaf identifier.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The two shard levels, e.g. `("ab", "cd")`.
    pub fn shard(&self) -> (&str, &str) {
        (&self.digest[..2], &self.digest[2..4])
    }

    /// Path of the entry relative to a cache root: `ab/cd/<domain>`.
    pub fn relative_path(&self) -> PathBuf {
        let (first, second) = self.shard();
        [first, second, self.domain.as_str()].iter().collect()
    }
}
