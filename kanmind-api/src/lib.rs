//! # KanMind API Server Library
//!
//! HTTP surface over `kanmind-shared`.
//!
//! - `app`: application state and router
//! - `config`: environment configuration
//! - `error`: error type and HTTP mapping
//! - `middleware`: security headers
//! - `routes`: request handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
