//! Store configuration.

use std::time::Duration;

/// When a sync cycle persists the token returned by `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Persist the new token before merging any entry. A cycle that fails
    /// part way still advances, so the failed entries are not listed again
    /// until they change upstream.
    #[default]
    AdvanceBeforeMerge,
    /// Persist the new token only once every entry was processed without
    /// a storage or codec error and no fetch was skipped. Otherwise the
    /// previous token stays, so the next cycle lists the same entries.
    AdvanceAfterMerge,
}

impl TokenPolicy {
    /// Parses `before` / `after`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "before" | "advance-before-merge" => Some(Self::AdvanceBeforeMerge),
            "after" | "advance-after-merge" => Some(Self::AdvanceAfterMerge),
            _ => None,
        }
    }
}

/// Configuration shared by every component of a store.
#[derive(Debug, Clone)]
pub struct TzConfig {
    /// Identifier written as `source` on locally produced specs.
    pub source_id: String,

    /// Base URL of the primary, if this node replicates from one.
    pub primary_url: Option<String>,

    /// Whether this node is itself a primary (never pulls).
    pub is_primary: bool,

    /// Delay between refresh cycles.
    pub refresh_delay: Duration,

    /// Upper bound on the delay after a failed cycle.
    pub failure_retry_cap: Duration,

    /// Sync token advance policy.
    pub token_policy: TokenPolicy,
}

impl Default for TzConfig {
    fn default() -> Self {
        Self {
            source_id: "tzcache".to_string(),
            primary_url: None,
            is_primary: false,
            refresh_delay: Duration::from_secs(60 * 60),
            failure_retry_cap: Duration::from_secs(10 * 60),
            token_policy: TokenPolicy::AdvanceBeforeMerge,
        }
    }
}

impl TzConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source identifier.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Sets the primary URL.
    #[must_use]
    pub fn with_primary_url(mut self, url: impl Into<String>) -> Self {
        self.primary_url = Some(url.into());
        self
    }

    /// Marks this node as a primary.
    #[must_use]
    pub const fn with_is_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Sets the refresh delay.
    #[must_use]
    pub const fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Sets the cap applied to the delay after a failed cycle.
    #[must_use]
    pub const fn with_failure_retry_cap(mut self, cap: Duration) -> Self {
        self.failure_retry_cap = cap;
        self
    }

    /// Sets the token policy.
    #[must_use]
    pub const fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    /// Returns `true` if sync cycles should reach out to a primary.
    pub fn pulls_from_primary(&self) -> bool {
        !self.is_primary && self.primary_url.is_some()
    }

    /// Delay before the next cycle given the outcome of the last one.
    pub fn next_wait(&self, last_cycle_succeeded: bool) -> Duration {
        if last_cycle_succeeded {
            self.refresh_delay
        } else {
            self.refresh_delay.min(self.failure_retry_cap)
        }
    }
}
