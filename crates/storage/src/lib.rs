//! Persistence for lesson progress: a small key/value port with in-memory and
//! `SQLite` backends, plus the key layout and value encodings.

pub mod codec;
pub mod keys;
pub mod repository;
pub mod sqlite;

pub use keys::ProgressKeys;
pub use repository::{InMemoryStore, ProgressStore, Storage, StorageError};
