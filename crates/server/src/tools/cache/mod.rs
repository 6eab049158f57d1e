//! Cache-related MCP tools.
//!
//! Read-only views of the cache generations in the SQLite store.

pub mod keys;
pub mod status;

pub use keys::{CacheKeysParams, keys_impl};
pub use status::status_impl;
