//! Read-only commands.

use super::{CliError, CliResult, StoreTarget};
use std::sync::Arc;
use tzcache_core::AliasGraph;
use tzcache_primary::PrimaryServer;

/// Prints a spec as JSON, or only its body.
pub fn get(target: &StoreTarget, tzid: &str, body_only: bool) -> CliResult<()> {
    let store = target.open_local();
    let session = store.session()?;
    let spec = session
        .get_spec(tzid)?
        .ok_or_else(|| CliError::Usage(format!("no such timezone: {tzid}")))?;

    if body_only {
        print!("{}", spec.vtimezone.unwrap_or_default());
    } else {
        println!("{}", serde_json::to_string_pretty(&spec)?);
    }
    Ok(())
}

/// Prints the tzids matching `pattern`, one per line.
pub fn find(target: &StoreTarget, pattern: &str) -> CliResult<()> {
    let store = target.open_local();
    let session = store.session()?;
    for tzid in tzcache_core::find_ids(&session, pattern)? {
        println!("{tzid}");
    }
    Ok(())
}

/// Prints the alias report, or the targets of `alias`.
pub fn aliases(target: &StoreTarget, alias: Option<&str>) -> CliResult<()> {
    let store = target.open_local();
    let session = store.session()?;
    match alias {
        Some(alias) => {
            let record = session
                .get_alias(alias)?
                .ok_or_else(|| CliError::Usage(format!("no such alias: {alias}")))?;
            for tzid in record.target_ids {
                println!("{tzid}");
            }
        }
        None => print!("{}", AliasGraph::build(&session)?.report()),
    }
    Ok(())
}

/// Prints the sync token.
pub fn token(target: &StoreTarget) -> CliResult<()> {
    let store = target.open_local();
    let session = store.session()?;
    match session.sync_token()? {
        Some(token) => println!("{token}"),
        None => println!("(none)"),
    }
    Ok(())
}

/// Prints the change list a secondary would receive from this store.
pub fn changes(target: &StoreTarget, since: Option<&str>) -> CliResult<()> {
    let store = Arc::new(target.open_local());
    let list = PrimaryServer::new(store).handle_list(since)?;
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
