//! Storage layer for durable, versioned item data.
//!
//! This module owns everything that touches SQLite: the numbered schema migrations,
//! the query shapes views can ask for, and the shared [`Store`] handle that performs
//! transactional reads and writes.
//!
//! # Modules
//!
//! - `schema`: Migration steps and schema version bookkeeping
//! - `filter`: Category/status query shapes compiled to SQL
//! - `sqlite`: The `Store` handle, snapshots, and commit notifications

pub mod filter;
pub mod schema;
pub mod sqlite;

pub use filter::ItemFilter;
pub use schema::{migrate_to, schema_version, CURRENT_SCHEMA_VERSION};
pub use sqlite::{ListenerId, Snapshot, Store};
