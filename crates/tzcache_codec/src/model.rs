//! Persisted entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A display name of a timezone in one language.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalizedName {
    /// Language tag, e.g. `en-US`.
    pub lang: String,
    /// The display name.
    pub value: String,
}

impl LocalizedName {
    /// Creates a localized name.
    pub fn new(lang: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            value: value.into(),
        }
    }
}

/// A cached timezone definition.
///
/// The body, etag, dtstamp and display names are always replaced wholesale
/// on update; nothing here is merged field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneSpec {
    /// Canonical timezone identifier.
    pub tzid: String,
    /// Version token from the primary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Last-modified time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::dtstamp::optional"
    )]
    pub dtstamp: Option<DateTime<Utc>>,
    /// Where this definition came from (primary URL, `bootstrap`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Whether the definition is served.
    #[serde(default)]
    pub active: bool,
    /// The VCALENDAR text carrying the VTIMEZONE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vtimezone: Option<String>,
    /// Display names, at most one per language. `None` and an empty list are
    /// distinct and both survive a round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_names: Option<Vec<LocalizedName>>,
}

impl TimezoneSpec {
    /// Creates an active spec with no body.
    pub fn new(tzid: impl Into<String>) -> Self {
        Self {
            tzid: tzid.into(),
            etag: None,
            dtstamp: None,
            source: None,
            active: true,
            vtimezone: None,
            display_names: None,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_vtimezone(mut self, vtimezone: impl Into<String>) -> Self {
        self.vtimezone = Some(vtimezone.into());
        self
    }

    /// Sets the etag.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the dtstamp.
    #[must_use]
    pub fn with_dtstamp(mut self, dtstamp: DateTime<Utc>) -> Self {
        self.dtstamp = Some(crate::dtstamp::whole_seconds(dtstamp));
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replaces the display names wholesale, keeping the last value given
    /// for each language. The result is ordered by language.
    pub fn replace_display_names<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = LocalizedName>,
    {
        let unique: BTreeMap<String, String> = names
            .into_iter()
            .map(|name| (name.lang, name.value))
            .collect();
        self.display_names = Some(
            unique
                .into_iter()
                .map(|(lang, value)| LocalizedName { lang, value })
                .collect(),
        );
    }

    /// Returns the display name for `lang`, if any.
    #[must_use]
    pub fn display_name(&self, lang: &str) -> Option<&str> {
        self.display_names
            .as_ref()?
            .iter()
            .find(|name| name.lang == lang)
            .map(|name| name.value.as_str())
    }
}

/// An alias and the canonical tzids it currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    /// The alias identifier.
    pub alias_id: String,
    /// Canonical tzids this alias resolves to.
    #[serde(default)]
    pub target_ids: BTreeSet<String>,
}

impl AliasRecord {
    /// Creates an alias with no targets.
    pub fn new(alias_id: impl Into<String>) -> Self {
        Self {
            alias_id: alias_id.into(),
            target_ids: BTreeSet::new(),
        }
    }

    /// Creates an alias resolving to `targets`.
    pub fn with_targets<I, S>(alias_id: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alias_id: alias_id.into(),
            target_ids: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a target. Returns true if it was not already present.
    pub fn add_target(&mut self, tzid: &str) -> bool {
        self.target_ids.insert(tzid.to_string())
    }

    /// Removes a target. Returns true if it was present.
    pub fn remove_target(&mut self, tzid: &str) -> bool {
        self.target_ids.remove(tzid)
    }

    /// Returns true once the alias resolves to nothing.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.target_ids.is_empty()
    }
}
