//! Request extractors.
//!
//! - [`auth::Viewer`] -- The calling principal, authenticated or anonymous.

pub mod auth;
