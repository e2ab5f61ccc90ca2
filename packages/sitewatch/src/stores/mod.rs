//! Storage implementations for the pipeline.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)
//!
//! `with_retry` wraps any store call in the bounded retry policy.

pub mod memory;
pub mod retry;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use retry::with_retry;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
