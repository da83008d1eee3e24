//! Persistence for Beacon: which agents exist and what they reported.
//!
//! The HTTP boundary talks to the store through the [`AgentStore`] and
//! [`CommandStore`] traits; [`SqliteStore`] implements both.

/// SQLite implementation.
pub mod sqlite;
/// Store traits.
pub mod store;

pub use sqlite::SqliteStore;
pub use store::{AgentStore, CommandStore};
