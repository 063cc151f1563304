//! Conversation session persistence.
//!
//! One record per conversation: the message history, the order in flight
//! (if any), and an optimistic-concurrency version. Backends: an in-memory
//! map for tests and a WAL-mode SQLite store for production.

pub mod db;
pub mod error;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use error::SessionError;
pub use sqlite::SqliteSessionStore;
pub use store::{MemorySessionStore, SessionRecord, SessionStore};
