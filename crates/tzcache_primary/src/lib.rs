//! # TZCache Primary
//!
//! Serves a timezone store to secondaries.
//!
//! A primary answers two requests:
//! - `GET /zones?changedsince=<token>` returns the change list: every active
//!   timezone whose dtstamp is later than the token, with its aliases and
//!   display names, and the token to send next time
//! - `GET /zones/<tzid>` returns the VCALENDAR body with an `ETag`, or 304
//!   when `If-None-Match` already names the current version
//!
//! Etags are the stored ones when a spec carries one, and a SHA-256 of the
//! body otherwise.
//!
//! [`PrimaryServer`] is transport-neutral: [`PrimaryServer::handle_get`] takes
//! a path and an optional `If-None-Match` and returns a
//! [`tzcache_protocol::HttpResponse`], so it can sit behind any HTTP front end
//! or be called in-process by a loopback client.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod etag;
mod server;

pub use error::{PrimaryError, PrimaryResult};
pub use etag::content_etag;
pub use server::PrimaryServer;
