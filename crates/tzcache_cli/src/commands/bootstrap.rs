//! `bootstrap` command.

use super::{CliResult, StoreTarget};
use std::path::Path;

/// Replaces the store with the dataset at `dataset`.
pub fn run(target: &StoreTarget, dataset: &Path) -> CliResult<()> {
    let store = target.open_local();
    let mut session = store.session()?;
    let outcome = tzcache_core::bootstrap(&mut session, dataset)?;
    session.close()?;

    println!("Bootstrapped {}", target.path().display());
    println!("  specs:    {}", outcome.specs);
    println!("  aliases:  {}", outcome.aliases);
    if outcome.skipped > 0 {
        println!("  skipped:  {} (no TZID)", outcome.skipped);
    }
    println!("  token:    {}", outcome.sync_token);
    Ok(())
}
