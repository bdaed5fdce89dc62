//! # Academy Shared Library
//!
//! Domain types, persistence and business rules used by the academy API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Passwords, tokens, request authentication and role policies
//! - `db`: Connection pool, migrations and database error helpers
//! - `services`: Multi-step operations such as guardian invitations

pub mod auth;
pub mod db;
pub mod models;
pub mod services;

/// Current version of the academy shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
