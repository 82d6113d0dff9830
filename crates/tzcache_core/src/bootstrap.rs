//! Cold load from a bulk dataset directory.
//!
//! Layout:
//!
//! ```text
//! dataset/
//!   version.txt          optional, a dtstamp
//!   aliases.txt          optional, alias report format
//!   zoneinfo/**/*.ics    one VTIMEZONE per file
//! ```

use crate::alias::parse_alias_report;
use crate::error::{CoreError, CoreResult};
use crate::store::Session;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tzcache_codec::calendar::{extract_tzid, wrap_vtimezone};
use tzcache_codec::{format_dtstamp, now_dtstamp, parse_dtstamp, TimezoneSpec};

/// `source` written on every bootstrapped spec.
pub const BOOTSTRAP_SOURCE: &str = "bootstrap";

/// Directory holding the `.ics` files.
pub const ZONEINFO_DIR: &str = "zoneinfo";
/// Alias report file.
pub const ALIASES_FILE: &str = "aliases.txt";
/// Dataset version file.
pub const VERSION_FILE: &str = "version.txt";

/// Counts from one bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    /// Specs written.
    pub specs: u64,
    /// Alias records written.
    pub aliases: u64,
    /// `.ics` files skipped because they carry no TZID.
    pub skipped: u64,
    /// The sync token stored.
    pub sync_token: String,
}

/// Replaces the whole store with the contents of `dataset`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDataset`] if `zoneinfo/` is missing or the
/// version is unreadable, an alias report error, or any I/O or storage error.
pub fn bootstrap(session: &mut Session<'_>, dataset: &Path) -> CoreResult<BootstrapOutcome> {
    let zoneinfo = dataset.join(ZONEINFO_DIR);
    if !zoneinfo.is_dir() {
        return Err(CoreError::invalid_dataset(format!(
            "{} is not a directory",
            zoneinfo.display()
        )));
    }

    let dtstamp = read_version(dataset)?;
    let aliases = match read_optional(&dataset.join(ALIASES_FILE))? {
        Some(text) => parse_alias_report(&text)?,
        None => Vec::new(),
    };

    let mut files = Vec::new();
    collect_ics(&zoneinfo, &mut files)?;
    files.sort();

    session.clear()?;

    let mut specs = 0;
    let mut skipped = 0;
    for path in files {
        let text = fs::read_to_string(&path)?;
        let Some(tzid) = extract_tzid(&text) else {
            warn!(file = %path.display(), "no TZID, skipping");
            skipped += 1;
            continue;
        };
        let spec = TimezoneSpec::new(tzid)
            .with_vtimezone(wrap_vtimezone(&text))
            .with_dtstamp(dtstamp)
            .with_source(BOOTSTRAP_SOURCE);
        session.put_spec(&spec)?;
        specs += 1;
    }

    for record in &aliases {
        session.put_alias(record)?;
    }

    let sync_token = format_dtstamp(&dtstamp);
    session.set_sync_token(&sync_token)?;

    info!(
        dataset = %dataset.display(),
        specs,
        aliases = aliases.len(),
        skipped,
        token = %sync_token,
        "bootstrap complete"
    );

    Ok(BootstrapOutcome {
        specs,
        aliases: aliases.len() as u64,
        skipped,
        sync_token,
    })
}

fn read_version(dataset: &Path) -> CoreResult<DateTime<Utc>> {
    match read_optional(&dataset.join(VERSION_FILE))? {
        Some(text) if !text.trim().is_empty() => parse_dtstamp(text.trim())
            .map_err(|e| CoreError::invalid_dataset(format!("{VERSION_FILE}: {e}"))),
        _ => Ok(now_dtstamp()),
    }
}

fn read_optional(path: &Path) -> CoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn collect_ics(dir: &Path, out: &mut Vec<PathBuf>) -> CoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_ics(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ics") {
            out.push(path);
        }
    }
    Ok(())
}
