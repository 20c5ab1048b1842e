//! `SQLite`-backed storage for collected event records.
//!
//! Payloads are opaque JSON documents; the store never interprets them
//! beyond persisting and returning them in insertion order.

mod db;
mod queries;

pub use db::EventStreamStore;
pub use evstream_core::db::DatabaseError;
