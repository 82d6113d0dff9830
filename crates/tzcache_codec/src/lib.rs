//! # TZCache Codec
//!
//! Entity types and their stable JSON encoding.
//!
//! The codec is a set of pure functions over `serde_json`: there is no
//! shared mapper and no mutable state, so any thread may encode or decode
//! at any time.
//!
//! ## Encoding Rules
//!
//! - Field names are camelCase (`displayNames`, `targetIds`)
//! - Absent optional fields are omitted, never written as `null`
//! - Timestamps are UTC `yyyy-MM-ddTHH:mm:ssZ`
//! - Sets are written in sorted order
//!
//! ## Usage
//!
//! ```
//! use tzcache_codec::{Document, TimezoneSpec};
//!
//! let spec = TimezoneSpec::new("Europe/Paris").with_etag("v1");
//! let bytes = spec.encode().unwrap();
//! let decoded = TimezoneSpec::decode(&bytes).unwrap();
//! assert_eq!(spec, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod calendar;
pub mod dtstamp;
mod error;
mod model;

pub use dtstamp::{format_dtstamp, now_dtstamp, parse_dtstamp, whole_seconds, DTSTAMP_FORMAT};
pub use error::{CodecError, CodecResult};
pub use model::{AliasRecord, LocalizedName, TimezoneSpec};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes any serializable value as compact JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes JSON bytes into `T`.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON for `T`.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// A persisted entity with its own key.
pub trait Document: Serialize + DeserializeOwned {
    /// Returns the key the entity is stored under.
    fn id(&self) -> &str;

    /// Encodes the entity.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_json(self)
    }

    /// Decodes an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document.
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_json(bytes)
    }

    /// Decodes an entity read from key `id`, checking that the document
    /// carries the same id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IdMismatch`] if the ids differ.
    fn decode_keyed(id: &str, bytes: &[u8]) -> CodecResult<Self> {
        let document = Self::decode(bytes)?;
        if document.id() != id {
            return Err(CodecError::IdMismatch {
                expected: id.to_string(),
                found: document.id().to_string(),
            });
        }
        Ok(document)
    }
}

impl Document for TimezoneSpec {
    fn id(&self) -> &str {
        &self.tzid
    }
}

impl Document for AliasRecord {
    fn id(&self) -> &str {
        &self.alias_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn full_spec() -> TimezoneSpec {
        let mut spec = TimezoneSpec::new("America/New_York")
            .with_etag("\"abc\"")
            .with_dtstamp(Utc.with_ymd_and_hms(2023, 11, 5, 6, 0, 0).unwrap())
            .with_source("https://tz.example.com")
            .with_vtimezone("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n");
        spec.replace_display_names([LocalizedName::new("en", "Eastern Time")]);
        spec
    }

    #[test]
    fn spec_json_shape() {
        let json: serde_json::Value = serde_json::from_slice(&full_spec().encode().unwrap()).unwrap();
        assert_eq!(json["tzid"], "America/New_York");
        assert_eq!(json["dtstamp"], "2023-11-05T06:00:00Z");
        assert_eq!(json["displayNames"][0]["lang"], "en");
        assert_eq!(json["active"], true);
    }

    #[test]
    fn absent_fields_are_omitted() {
        let bytes = TimezoneSpec::new("UTC").encode().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"tzid":"UTC","active":true}"#);
    }

    #[test]
    fn spec_roundtrip_keeps_empty_vs_absent_names() {
        let absent = TimezoneSpec::new("UTC");
        let mut empty = TimezoneSpec::new("UTC");
        empty.display_names = Some(Vec::new());

        assert_eq!(TimezoneSpec::decode(&absent.encode().unwrap()).unwrap(), absent);
        assert_eq!(TimezoneSpec::decode(&empty.encode().unwrap()).unwrap(), empty);
        assert_eq!(TimezoneSpec::decode(&full_spec().encode().unwrap()).unwrap(), full_spec());
    }

    #[test]
    fn alias_json_shape() {
        let alias = AliasRecord::with_targets("US/Eastern", ["America/New_York"]);
        let bytes = alias.encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"aliasId":"US/Eastern","targetIds":["America/New_York"]}"#
        );
    }

    #[test]
    fn decode_keyed_checks_id() {
        let bytes = AliasRecord::new("A").encode().unwrap();
        assert!(AliasRecord::decode_keyed("A", &bytes).is_ok());
        assert!(matches!(
            AliasRecord::decode_keyed("B", &bytes),
            Err(CodecError::IdMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_date() {
        let bytes = br#"{"tzid":"X","dtstamp":"not a date"}"#;
        assert!(matches!(TimezoneSpec::decode(bytes), Err(CodecError::Json(_))));
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(tzid in "[A-Za-z_/]{1,30}", etag in proptest::option::of("[a-z0-9]{1,12}")) {
            let mut spec = TimezoneSpec::new(tzid);
            spec.etag = etag;
            prop_assert_eq!(spec.encode().unwrap(), spec.clone().encode().unwrap());
            prop_assert_eq!(TimezoneSpec::decode(&spec.encode().unwrap()).unwrap(), spec);
        }
    }
}
