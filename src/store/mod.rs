//! Persistence and object lifecycle
//!
//! - `catalog.rs` - SQLite tables for sessions, groups and pages
//! - `context.rs` - live object graph: insert, fetch, evict and save pages

pub mod catalog;
pub mod context;

pub use catalog::Catalog;
pub use context::ObjectContext;
