//! Client code for docuclean.
//!
//! This crate provides the reqwest-backed network used by the cache
//! controller, a typed client for the processing backend, and the
//! page-side helpers (debounced preview refresh, session view-model).

pub mod backend;
pub mod debounce;
pub mod fetch;
pub mod session;

pub use backend::{BackendClient, BackendConfig, BackendError, CleanOptions};
pub use debounce::Debouncer;
pub use fetch::{FetchClient, FetchConfig};
pub use session::{SelectedFile, Session};
