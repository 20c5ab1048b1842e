//! Evstream Core Library
//!
//! Shared functionality for evstream components:
//! - Newline-delimited JSON wire codec for the inspector connection
//! - Protocol shapes (hello, requests, responses)
//! - `SQLite` pool helpers for event storage
//! - Tracing/logging initialization
//! - Common error types

pub mod db;
pub mod error;
pub mod protocol;
pub mod tracing_init;
pub mod wire;

pub use error::{Error, Result};
