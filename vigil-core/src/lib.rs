//! Vigil Core - Shared types, database models, and queries
//!
//! This crate provides the foundational types and database access layer
//! used by the scanner and dashboard applications.

pub mod db;
pub mod models;
pub mod types;

pub use db::Database;
pub use models::*;
pub use types::*;
