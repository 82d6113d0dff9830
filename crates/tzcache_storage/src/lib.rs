//! # TZCache Storage
//!
//! Storage backend trait and engines for TZCache.
//!
//! This crate provides the lowest-level storage abstraction: a key-value
//! store over three logical collections (timezone specs, aliases, metadata).
//! Backends are **opaque document stores** - they never interpret the JSON
//! documents they hold.
//!
//! ## Design Principles
//!
//! - Backends only supply get/put/delete/scan/clear
//! - Collection namespacing lives in one module ([`namespaced_key`])
//! - Must be `Send` so a store can move its backend behind a lock
//! - Higher layers own every document format
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral caches
//! - [`LogBackend`] - Append-only log with an ordered key index
//! - [`SqliteBackend`] - One `(id, blob)` table per collection
//!
//! ## Example
//!
//! ```rust
//! use tzcache_storage::{Collection, InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.put(Collection::Aliases, "US/Pacific", b"{}").unwrap();
//! assert_eq!(backend.scan(Collection::Aliases).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod collection;
mod error;
mod file;
mod log;
mod memory;
mod sqlite;

pub use backend::StorageBackend;
pub use collection::{namespaced_key, split_key, Collection};
pub use error::{StorageError, StorageResult};
pub use file::LogFile;
pub use log::LogBackend;
pub use memory::InMemoryBackend;
pub use sqlite::SqliteBackend;
