//! Worker lifecycle and fetch tools.

pub mod fetch;
pub mod install;

pub use fetch::{WorkerFetchParams, fetch_impl};
pub use install::{WorkerInstallParams, WorkerMessageParams, install_impl, message_impl, release_clients_impl};
