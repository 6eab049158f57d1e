//! SQLite-backed storage for versioned cache generations.
//!
//! This module provides a persistent cache store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named cache generations, each a URL-keyed response map
//! - Atomic bulk population (install) and per-entry upserts (lazy fill)
//! - Generation enumeration and deletion (activation cleanup)
//! - A durable record of the active generation per worker scope
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod keys;
pub mod migrations;
pub mod registry;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use registry::ActiveRecord;
pub use store::{CacheSummary, StoredResponse};
