//! # TaskFlow Shared Library
//!
//! Domain types and business logic for the TaskFlow task-assignment and
//! approval workflow, used by the API server.
//!
//! ## Module Organization
//!
//! - `models`: Users, roles, permissions, tasks, comments, notifications
//! - `auth`: Password hashing, JWT tokens, principals and permission checks
//! - `store`: Storage ports with in-memory and PostgreSQL adapters
//! - `db`: PostgreSQL pool and embedded migrations
//! - `services`: Directory, lifecycle engine, audit trail, notifications,
//!   reports

pub mod auth;
pub mod db;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the TaskFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
