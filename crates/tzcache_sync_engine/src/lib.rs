//! # TZCache Sync Engine
//!
//! Replication of timezone definitions from a primary authority.
//!
//! This crate provides:
//! - `SyncEngine`: one pull cycle (list, conditional fetch, merge)
//! - `RefreshScheduler`: the background refresh thread with backoff
//! - `PrimarySource` with HTTP (`HttpPrimary`) and mock implementations
//! - `TzService`: the facade read and admin callers use
//!
//! ## Key Invariants
//!
//! - The primary is authoritative; the sync path never deletes specs
//! - A failed `list` leaves the store untouched
//! - Entries are merged independently; earlier ones are never rolled back
//! - Alias graphs are rebuilt per cycle from one scan
//! - All store access happens inside one session, under the store lock

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod scheduler;
mod service;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use engine::{SyncEngine, SyncOutcome, SyncState, SyncStats, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpPrimary, LoopbackClient, LoopbackServer, ReqwestClient};
pub use scheduler::RefreshScheduler;
pub use service::{ServiceStats, TzService};
pub use transport::{MockPrimary, PrimarySource};
