//! # KanMind Shared Library
//!
//! Domain types, persistence and access control used by the KanMind API.
//!
//! ## Module Organization
//!
//! - `models`: boards, tasks, comments, users and their SQL
//! - `store`: the `EntityStore` trait with PostgreSQL and in-memory backends
//! - `auth`: password hashing, JWT, auth middleware and the access policy
//! - `db`: connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the KanMind shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
