//! Local list cache
//!
//! The [`ListStore`] trait is the only way cached rows are mutated. Two
//! backends are provided: SQLite for the durable on-device cache and an
//! in-memory store for tests and ephemeral lists.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryListStore;
pub use sqlite::SqliteListStore;
pub use traits::{ListStore, StoreError};
