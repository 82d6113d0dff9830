//! `apply-diff` command.

use super::{CliResult, StoreTarget};
use std::fs;
use std::path::Path;
use tzcache_protocol::DiffBatch;

/// Applies the diff batch stored in `file`.
pub fn run(target: &StoreTarget, file: &Path) -> CliResult<()> {
    let batch = DiffBatch::decode(&fs::read(file)?)?;
    let store = target.open_local();
    let mut session = store.session()?;
    let outcome = tzcache_core::apply_diff(&mut session, batch.dtstamp, &batch.entries)?;
    session.close()?;

    println!("Applied {} entries from {}", batch.entries.len(), file.display());
    println!("  created:  {}", outcome.specs_created);
    println!("  updated:  {}", outcome.specs_updated);
    println!(
        "  aliases:  {} written, {} deleted",
        outcome.aliases.written, outcome.aliases.deleted
    );
    println!("  token:    {}", outcome.sync_token);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendKind;
    use tzcache_protocol::DiffListEntry;
    use tzcache_testkit::{january, vtimezone};

    #[test]
    fn applies_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("batch.json");
        let batch = DiffBatch::new(
            january(3),
            vec![DiffListEntry::added("UTC", vtimezone("UTC")).with_aliases(["Zulu"])],
        );
        fs::write(&file, batch.encode().unwrap()).unwrap();

        let target = StoreTarget::new(dir.path().join("store"), BackendKind::Log);
        run(&target, &file).unwrap();

        let store = target.open_local();
        let session = store.session().unwrap();
        assert!(session.get_spec("UTC").unwrap().is_some());
        assert!(session.get_alias("Zulu").unwrap().is_some());
        assert_eq!(
            session.sync_token().unwrap().as_deref(),
            Some("2024-01-03T00:00:00Z")
        );
    }

    #[test]
    fn rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("batch.json");
        fs::write(&file, b"{\"entries\": []}").unwrap();

        let target = StoreTarget::new(dir.path().join("store"), BackendKind::Log);
        assert!(run(&target, &file).is_err());
    }
}
