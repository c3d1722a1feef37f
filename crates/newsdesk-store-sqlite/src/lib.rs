//! SQLite backend for the newsdesk work item store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write method of
//! [`newsdesk_core::store::PipelineStore`] runs inside a single SQLite
//! transaction, including the precondition checks that guard it.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
