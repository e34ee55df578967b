//! Core types and shared functionality for davatar.
//!
//! This crate provides:
//! - Domain and resolved-URL types
//! - The avatar cache with filesystem, SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod resolve;

pub use cache::{AvatarCache, CacheEntry, CacheStore, EntryKey, open_store};
pub use config::{AppConfig, CacheBackend, ConfigError};
pub use domain::Domain;
pub use error::Error;
pub use resolve::{Resolve, ResolvedUrl};
