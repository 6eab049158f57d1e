//! MCP tool implementations.
//!
//! This module contains all tools exposed by the docuclean server.

pub mod analytics;
pub mod cache;
pub mod worker;

pub use cache::{CacheKeysParams, keys_impl, status_impl};
pub use worker::{
    WorkerFetchParams, WorkerInstallParams, WorkerMessageParams, fetch_impl, install_impl, message_impl,
    release_clients_impl,
};
