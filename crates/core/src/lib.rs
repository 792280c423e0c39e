//! Presence registry and cooperative write-lock arbitration.
//!
//! This crate has no HTTP or database dependencies so that the API layer,
//! the Postgres store, and tests can all share the same merge rules, lock
//! policy, and snapshot projection.

pub mod config;
pub mod error;
pub mod identifier;
pub mod lock;
pub mod message;
pub mod presence;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod types;
