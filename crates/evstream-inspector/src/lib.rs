//! Evstream Inspector Daemon Library
//!
//! Core functionality for the evstream inspector daemon:
//! - `SQLite` storage for collected event records
//! - Port abstraction over the single peer connection
//! - Relay routing inspector requests to storage
//! - TCP/NDJSON frontend accepting peer connections

pub mod port;
pub mod relay;
pub mod server;
pub mod storage;
