//! Externally computed diff batches (administrative push).

use crate::error::ProtocolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a diff batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffListEntry {
    /// The timezone the entry is about.
    pub tzid: String,
    /// `true` if the timezone is new, `false` if it is an update.
    #[serde(default)]
    pub add: bool,
    /// Only the aliases changed; `tz_spec` is ignored.
    #[serde(default)]
    pub alias_change_only: bool,
    /// VTIMEZONE fragment for the new body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz_spec: Option<String>,
    /// Alias ids that now point at `tzid`.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl DiffListEntry {
    /// An entry creating `tzid` from `fragment`.
    pub fn added(tzid: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            tzid: tzid.into(),
            add: true,
            alias_change_only: false,
            tz_spec: Some(fragment.into()),
            aliases: Vec::new(),
        }
    }

    /// An entry replacing the body of an existing `tzid`.
    pub fn updated(tzid: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            add: false,
            ..Self::added(tzid, fragment)
        }
    }

    /// An entry that only re-points aliases.
    pub fn alias_change(tzid: impl Into<String>) -> Self {
        Self {
            tzid: tzid.into(),
            add: false,
            alias_change_only: true,
            tz_spec: None,
            aliases: Vec::new(),
        }
    }

    /// Sets the aliases reported for this entry.
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// A whole diff batch as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffBatch {
    /// Becomes the new sync token once every entry is applied.
    #[serde(with = "tzcache_codec::dtstamp::required")]
    pub dtstamp: DateTime<Utc>,
    /// Entries, applied in order.
    #[serde(default)]
    pub entries: Vec<DiffListEntry>,
}

impl DiffBatch {
    /// Creates a batch.
    pub fn new(dtstamp: DateTime<Utc>, entries: Vec<DiffListEntry>) -> Self {
        Self { dtstamp, entries }
    }

    /// Decodes a batch from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a diff batch.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes the batch as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_admin_batch() {
        let batch = DiffBatch::decode(
            br#"{"dtstamp":"2024-03-01T00:00:00Z","entries":[
                {"tzid":"X","add":true,"tzSpec":"BEGIN:VTIMEZONE\r\nEND:VTIMEZONE","aliases":["X1"]},
                {"tzid":"Y","aliasChangeOnly":true}]}"#,
        )
        .unwrap();

        assert_eq!(batch.dtstamp, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(
            batch.entries,
            vec![
                DiffListEntry::added("X", "BEGIN:VTIMEZONE\r\nEND:VTIMEZONE").with_aliases(["X1"]),
                DiffListEntry::alias_change("Y"),
            ]
        );
    }

    #[test]
    fn missing_dtstamp_is_rejected() {
        assert!(DiffBatch::decode(br#"{"entries":[]}"#).is_err());
    }

    #[test]
    fn updated_is_not_add() {
        let entry = DiffListEntry::updated("X", "frag");
        assert!(!entry.add);
        assert_eq!(entry.tz_spec.as_deref(), Some("frag"));
    }
}
