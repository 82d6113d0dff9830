//! Timestamp rendering.
//!
//! Every timestamp is stored and exchanged as `yyyy-MM-ddTHH:mm:ssZ` in UTC.
//! Parsing is lenient: it also accepts RFC 3339 with an offset and the
//! iCalendar basic form `yyyyMMddTHHmmssZ`.

use crate::error::{CodecError, CodecResult};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// The canonical `strftime` format.
pub const DTSTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const BASIC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Renders `value` in the canonical form.
#[must_use]
pub fn format_dtstamp(value: &DateTime<Utc>) -> String {
    value.format(DTSTAMP_FORMAT).to_string()
}

/// Parses a timestamp in any accepted form.
///
/// # Errors
///
/// Returns [`CodecError::InvalidDtstamp`] if no form matches.
pub fn parse_dtstamp(value: &str) -> CodecResult<DateTime<Utc>> {
    let trimmed = value.trim();
    for format in [DTSTAMP_FORMAT, BASIC_FORMAT] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| whole_seconds(dt.with_timezone(&Utc)))
        .map_err(|_| CodecError::invalid_dtstamp(value))
}

/// Drops any fraction of a second. The canonical form has no room for one,
/// so every stored timestamp goes through this first.
#[must_use]
pub fn whole_seconds(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(0)
}

/// Returns the current time in whole seconds.
#[must_use]
pub fn now_dtstamp() -> DateTime<Utc> {
    whole_seconds(Utc::now())
}

/// Serde adapter for required timestamps.
pub mod required {
    use super::{format_dtstamp, parse_dtstamp};
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serializes in the canonical form.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_dtstamp(value))
    }

    /// Deserializes any accepted form.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_dtstamp(&raw).map_err(de::Error::custom)
    }
}

/// Serde adapter for optional timestamps. Pair with
/// `skip_serializing_if = "Option::is_none"` and `default`.
pub mod optional {
    use super::{format_dtstamp, parse_dtstamp};
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serializes in the canonical form.
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&format_dtstamp(dt)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes any accepted form; `null` becomes `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_dtstamp(&raw).map_err(de::Error::custom))
            .transpose()
    }
}
