//! Client code for davatar.
//!
//! This crate provides the HTTP fetch pipeline, the head-tag scanner, and
//! the network-backed [`AvatarResolver`] used by the server and CLI.

pub mod fetch;
pub mod resolver;
pub mod scan;

pub use fetch::{FetchClient, FetchConfig, FetchError, FetchResponse};
pub use resolver::{AvatarResolver, candidate_from_html};
pub use scan::{CandidateSet, ScanOutcome, StopReason, TagCategory, scan_head};
