//! Outcome of one reconciliation pass.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub entry_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub rename_failures: Vec<RenameFailure>,
    pub failures: Vec<EntryFailure>,
}

impl SyncReport {
    /// True when the pass changed nothing in the vault
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.renamed == 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.rename_failures.is_empty()
    }

    /// One line per failed entry or skipped rename, for the user notification
    pub fn failure_summary(&self) -> String {
        let entries = self
            .failures
            .iter()
            .map(|f| format!("entry {}: {}", f.entry_id, f.error));
        let renames = self.rename_failures.iter().map(|f| {
            format!("rename {} -> {}: {}", f.from.display(), f.to.display(), f.error)
        });
        entries.chain(renames).collect::<Vec<_>>().join("\n")
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} renamed",
            self.created, self.updated, self.unchanged, self.renamed
        )?;
        if !self.rename_failures.is_empty() {
            write!(f, ", {} renames skipped", self.rename_failures.len())?;
        }
        if !self.failures.is_empty() {
            write!(f, ", {} failed", self.failures.len())?;
        }
        Ok(())
    }
}
