//! Messages of the primary pull protocol.
//!
//! A secondary asks the primary for everything changed since its sync token
//! (`list`) and then fetches each listed definition, conditioned on the etag
//! it already holds (`fetch`). List bodies are JSON in the tzdist shape:
//!
//! ```json
//! {"synctoken": "2024-01-01T00:00:00Z",
//!  "timezones": [{"tzid": "Europe/Paris", "last-modified": "...",
//!                 "aliases": ["Europe/Monaco"],
//!                 "local-names": [{"lang": "fr", "name": "Paris"}]}]}
//! ```

use crate::error::ProtocolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tzcache_codec::LocalizedName;

/// A display name as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalName {
    /// Language tag.
    pub lang: String,
    /// The display name.
    pub name: String,
}

impl From<LocalName> for LocalizedName {
    fn from(name: LocalName) -> Self {
        LocalizedName::new(name.lang, name.name)
    }
}

impl From<&LocalizedName> for LocalName {
    fn from(name: &LocalizedName) -> Self {
        Self {
            lang: name.lang.clone(),
            name: name.value.clone(),
        }
    }
}

/// One changed timezone in a change list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// The changed timezone.
    pub tzid: String,
    /// When the primary last modified it.
    #[serde(
        rename = "last-modified",
        default,
        skip_serializing_if = "Option::is_none",
        with = "tzcache_codec::dtstamp::optional"
    )]
    pub last_modified: Option<DateTime<Utc>>,
    /// Every alias that currently resolves to this timezone.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Display names. Empty means "leave the stored names alone".
    #[serde(rename = "local-names", default)]
    pub local_names: Vec<LocalName>,
}

impl ChangeEntry {
    /// Creates an entry with no aliases or names.
    pub fn new(tzid: impl Into<String>) -> Self {
        Self {
            tzid: tzid.into(),
            last_modified: None,
            aliases: Vec::new(),
            local_names: Vec::new(),
        }
    }

    /// Sets the last-modified time.
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Sets the aliases.
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a display name.
    #[must_use]
    pub fn with_local_name(mut self, lang: impl Into<String>, name: impl Into<String>) -> Self {
        self.local_names.push(LocalName {
            lang: lang.into(),
            name: name.into(),
        });
        self
    }
}

/// Response to `list(changedSince)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    /// The primary's new global sync token.
    #[serde(rename = "synctoken")]
    pub sync_token: String,
    /// Timezones changed since the requested token.
    #[serde(rename = "timezones", default)]
    pub entries: Vec<ChangeEntry>,
}

impl ChangeList {
    /// Creates a change list.
    pub fn new(sync_token: impl Into<String>, entries: Vec<ChangeEntry>) -> Self {
        Self {
            sync_token: sync_token.into(),
            entries,
        }
    }

    /// Encodes to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a change list.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Response to `fetch(tzid, etag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The definition differs from the given etag.
    Modified {
        /// The new version token, if the primary sent one.
        etag: Option<String>,
        /// The VCALENDAR text.
        body: String,
    },
    /// The given etag is current.
    Unchanged,
    /// The primary has no such timezone.
    NotFound,
}

impl FetchResult {
    /// Creates a modified result.
    pub fn modified(etag: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Modified {
            etag: Some(etag.into()),
            body: body.into(),
        }
    }
}
