//! Core types and shared functionality for docuclean.
//!
//! This crate provides:
//! - Versioned cache store with SQLite backend
//! - The offline cache controller (install, activate, fetch, message)
//! - The host runtime that dispatches lifecycle events
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod network;
pub mod registration;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cache::{CacheDb, StoredResponse};
pub use config::AppConfig;
pub use controller::{CacheController, ControlMessage, ControllerConfig, FetchEvent, ResponseSource, WorkerState};
pub use error::Error;
pub use network::{Network, Request, RequestMode, Response};
pub use registration::Registration;
