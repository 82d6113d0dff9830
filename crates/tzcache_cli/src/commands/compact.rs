//! `compact` command.

use super::{CliResult, StoreTarget};

/// Reclaims space held by dead records.
pub fn run(target: &StoreTarget) -> CliResult<()> {
    let store = target.open_local();
    let mut session = store.session()?;
    session.compact()?;
    session.close()?;
    println!("Compacted {}", target.path().display());
    Ok(())
}
