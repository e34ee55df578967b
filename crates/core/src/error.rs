//! Unified error types for davatar.
//!
//! Display strings carry a stable upper-case code prefix so log lines and
//! HTTP error bodies can be matched on without parsing the message.

use std::path::PathBuf;

use tokio_rusqlite::rusqlite;

/// Unified error types for the davatar library crates.
///
/// "No avatar found" is not an error: it is the empty [`crate::ResolvedUrl`].
/// Network failures never reach this type either, the resolver folds them
/// into the empty result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The supplied domain is not a usable DNS name.
    #[error("INVALID_DOMAIN: {0}")]
    InvalidDomain(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Filesystem operation on the cache failed.
    #[error("CACHE_ERROR: failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// The outbound HTTP client could not be constructed.
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),
}

impl Error {
    /// Wrap an I/O error with the action and path it happened on.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { action, path: path.into(), source }
    }

    /// Whether this error means the cache storage itself is unusable.
    ///
    /// Callers use this to fall back to an uncached resolution instead of
    /// failing the request.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Io { .. } | Error::CorruptEntry(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
