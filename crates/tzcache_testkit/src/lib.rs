//! # TZCache Testkit
//!
//! Test utilities for TZCache.
//!
//! This crate provides:
//! - Stores over every backend with automatic cleanup
//! - Sample VTIMEZONE bodies and bulk dataset directories
//! - A backend that fails on demand
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tzcache_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     let store = TestStore::memory(TzConfig::default());
//!     let mut session = store.session().unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use tzcache_core::{Store, TzConfig};
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
