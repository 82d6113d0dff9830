//! `sync` and `watch` commands.

use super::{CliError, CliResult, StoreTarget};
use clap::Args;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tzcache_core::{TokenPolicy, TzConfig};
use tzcache_sync_engine::{
    HttpPrimary, ReqwestClient, RetryConfig, SyncConfig, SyncEngine, SyncOutcome, TzService,
};

/// Arguments naming the primary and how to talk to it.
#[derive(Args, Debug, Clone)]
pub struct PrimaryArgs {
    /// Base URL of the primary
    #[arg(long)]
    pub primary: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Attempts for the change list request
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// When to persist the new sync token (before, after)
    #[arg(long, default_value = "before")]
    pub token_policy: String,

    /// Source id recorded on stored specs
    #[arg(long)]
    pub source_id: Option<String>,
}

impl PrimaryArgs {
    fn tz_config(&self) -> CliResult<TzConfig> {
        let policy = TokenPolicy::parse(&self.token_policy).ok_or_else(|| {
            CliError::Usage(format!(
                "unknown token policy '{}' (expected before or after)",
                self.token_policy
            ))
        })?;
        let mut config = TzConfig::new()
            .with_primary_url(self.primary.clone())
            .with_token_policy(policy);
        if let Some(source_id) = &self.source_id {
            config = config.with_source_id(source_id.clone());
        }
        Ok(config)
    }

    fn engine(&self) -> CliResult<SyncEngine<HttpPrimary<ReqwestClient>>> {
        let config = SyncConfig::new()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_retry(RetryConfig::new(self.retries));
        let client = ReqwestClient::new(&config)?;
        Ok(SyncEngine::with_config(
            config,
            HttpPrimary::new(self.primary.clone(), client),
        ))
    }
}

/// Runs one sync cycle.
pub fn run_once(target: &StoreTarget, args: &PrimaryArgs) -> CliResult<()> {
    let store = target.open(args.tz_config()?);
    let engine = args.engine()?;
    let mut session = store.session()?;
    let outcome = engine.synchronize_from_primary(&mut session)?;
    session.close()?;

    print_outcome(&outcome);
    if outcome.success {
        Ok(())
    } else {
        Err(CliError::Usage(format!(
            "sync failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )))
    }
}

/// Runs the refresh thread until `cycles` have completed, or forever.
pub fn watch(
    target: &StoreTarget,
    args: &PrimaryArgs,
    interval: u64,
    cycles: Option<u64>,
) -> CliResult<()> {
    let interval = Duration::from_secs(interval.max(1));
    let config = args.tz_config()?.with_refresh_delay(interval);
    let store = Arc::new(target.open(config));
    let mut service = TzService::new(store, args.engine()?);
    service.start_refresh()?;
    info!(primary = %args.primary, ?interval, "watching primary");

    let poll = Duration::from_millis(200);
    let mut reported = 0;
    loop {
        thread::sleep(poll);
        let stats = service.stats().sync;
        if stats.cycles > reported {
            reported = stats.cycles;
            println!(
                "cycle {}: {} ({} specs written, {} failures so far)",
                stats.cycles,
                stats.last_status_str(),
                stats.specs_written,
                stats.failures
            );
        }
        if cycles.is_some_and(|limit| stats.cycles >= limit) {
            break;
        }
    }

    service.shutdown();
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    if outcome.not_applicable {
        println!("Nothing to do: store has no primary");
        return;
    }
    println!("Sync {}", outcome.status());
    println!("  listed:    {}", outcome.entries_listed);
    println!("  fetched:   {}", outcome.fetched);
    println!("  unchanged: {}", outcome.unchanged);
    println!("  missing:   {}", outcome.missing);
    println!("  failed:    {}", outcome.fetch_failures);
    println!(
        "  aliases:   {} written, {} deleted",
        outcome.aliases.written, outcome.aliases.deleted
    );
    if let Some(token) = &outcome.token_advanced {
        println!("  token:     {token}");
    }
    println!("  took:      {:?}", outcome.duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(policy: &str) -> PrimaryArgs {
        PrimaryArgs {
            primary: "http://primary.test".into(),
            timeout: 5,
            retries: 1,
            token_policy: policy.into(),
            source_id: Some("mirror".into()),
        }
    }

    #[test]
    fn builds_store_config() {
        let config = args("after").tz_config().unwrap();
        assert_eq!(config.token_policy, TokenPolicy::AdvanceAfterMerge);
        assert_eq!(config.source_id, "mirror");
        assert!(config.pulls_from_primary());
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(matches!(
            args("sometimes").tz_config(),
            Err(CliError::Usage(_))
        ));
    }
}
