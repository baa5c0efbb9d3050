//! songbridge core library
//!
//! Resolves a link to a song, album, playlist, artist or podcast on one
//! streaming service into equivalent links on the others.
//!
//! # Architecture
//!
//! - [`parser`] - link identification, source metadata and query derivation
//! - [`adapter`] - per-service search, candidate scoring and classification
//! - [`search`] - the orchestrator that fans out, merges and ranks
//! - [`token`] - OAuth client-credential tokens with background refresh
//! - [`cache`] - cache-aside layer over in-memory or SQLite stores
//! - [`rate_limit`] - per-client sliding-window admission
//! - [`http`] - outbound HTTP with retry and timeouts
//! - [`config`] - file and environment configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod cache;
pub mod config;
pub mod http;
pub mod model;
pub mod parser;
pub mod rate_limit;
pub mod search;
pub mod token;
pub mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use adapter::{Adapter, AdapterSet};
pub use cache::Cache;
pub use config::Config;
pub use model::{ContentType, ResultLink, SearchResult, ServiceKind};
pub use parser::{Parser, ParserSet};
pub use search::{SearchError, SearchOrchestrator, SearchRequest};
