//! # TZCache Core
//!
//! The timezone store and the logic written once against it.
//!
//! This crate provides:
//! - `Store` / `Session`: one backend behind one mutex, opened per session
//! - `AliasGraph`: the bidirectional alias index and its reconciliation
//! - `apply_diff`: administrative diff batches
//! - `find_ids`: substring search over tzids and aliases
//! - `bootstrap`: cold load from a dataset directory
//! - `TzConfig` and `StoreStats`
//!
//! ## Example
//!
//! ```rust
//! use tzcache_core::{find_ids, Store, TzConfig};
//! use tzcache_codec::{AliasRecord, TimezoneSpec};
//!
//! let store = Store::in_memory(TzConfig::default());
//! let mut session = store.session().unwrap();
//! session.put_spec(&TimezoneSpec::new("America/New_York")).unwrap();
//! session
//!     .put_alias(&AliasRecord::with_targets("US/Eastern", ["America/New_York"]))
//!     .unwrap();
//!
//! let found = find_ids(&session, "Eastern").unwrap();
//! assert!(found.contains("America/New_York"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alias;
pub mod bootstrap;
mod config;
pub mod diff;
mod error;
mod finder;
mod stats;
mod store;

pub use alias::{parse_alias_report, AliasChanges, AliasGraph};
pub use bootstrap::{bootstrap, BootstrapOutcome};
pub use config::{TokenPolicy, TzConfig};
pub use diff::{apply_diff, DiffOutcome};
pub use error::{CoreError, CoreResult};
pub use finder::find_ids;
pub use stats::{StoreStats, StoreStatsSnapshot};
pub use store::{Session, Store, SYNC_TOKEN_ID};
