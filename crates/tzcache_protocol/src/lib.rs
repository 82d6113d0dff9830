//! # TZCache Sync Protocol
//!
//! Protocol types for replicating timezone definitions from a primary.
//!
//! This crate provides:
//! - `ChangeList` / `ChangeEntry` for `list(changedSince)`
//! - `FetchResult` for conditional `fetch(tzid, etag)`
//! - `DiffBatch` / `DiffListEntry` for administrative pushes
//! - Request paths and a transport-neutral `HttpResponse`
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod error;
pub mod http;
mod messages;
pub mod paths;

pub use diff::{DiffBatch, DiffListEntry};
pub use error::{ProtocolError, ProtocolResult};
pub use http::HttpResponse;
pub use messages::{ChangeEntry, ChangeList, FetchResult, LocalName};
pub use paths::PrimaryRequest;
