//! SQLite-backed `TaskStore` implementation.
//!
//! `vox-core` defines the store contract and depends on nothing in this
//! crate; this crate is an optional, swappable write-through layer behind
//! it.

mod config;
mod models;
mod pool;
mod queries;
mod sqlite_store;

pub use config::StoreConfig;
pub use pool::{create_pool, run_migrations};
pub use sqlite_store::SqliteTaskStore;
