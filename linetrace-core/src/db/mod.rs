//! Database layer for linetrace
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - The [`DiffStore`] contract the metrics engine reads through

pub mod repo;
pub mod schema;
pub mod store;

pub use repo::Database;
pub use store::{is_under, resolve_path, DiffLineFilter, DiffStore, SummaryFilter};
