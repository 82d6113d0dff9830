//! `inspect` command.

use super::{CliError, CliResult, StoreTarget};
use serde::Serialize;

/// Summary of a store.
#[derive(Debug, Serialize)]
struct StoreSummary {
    backend: &'static str,
    path: String,
    specs: usize,
    inactive_specs: usize,
    specs_without_body: usize,
    aliases: usize,
    sync_token: Option<String>,
}

/// Prints store statistics.
pub fn run(target: &StoreTarget, format: &str) -> CliResult<()> {
    let store = target.open_local();
    let session = store.session()?;
    let specs = session.specs()?;
    let summary = StoreSummary {
        backend: session.backend_name(),
        path: target.path().display().to_string(),
        specs: specs.len(),
        inactive_specs: specs.iter().filter(|s| !s.active).count(),
        specs_without_body: specs.iter().filter(|s| s.vtimezone.is_none()).count(),
        aliases: session.aliases()?.len(),
        sync_token: session.sync_token()?,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "text" => {
            println!("TZCache store: {}", summary.path);
            println!("  backend:       {}", summary.backend);
            println!("  specs:         {}", summary.specs);
            println!("    inactive:    {}", summary.inactive_specs);
            println!("    no body:     {}", summary.specs_without_body);
            println!("  aliases:       {}", summary.aliases);
            println!(
                "  sync token:    {}",
                summary.sync_token.as_deref().unwrap_or("(none)")
            );
        }
        other => {
            return Err(CliError::Usage(format!(
                "unknown format '{other}' (expected text or json)"
            )))
        }
    }
    Ok(())
}
