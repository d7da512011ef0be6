//! Reconciliation of fetched list entries against the managed notes of one
//! folder.
//!
//! A note is managed when its metadata carries `man: man` and a numeric `id`.
//! The pass first moves managed notes to their templated names (unless the
//! user's names are respected), then creates missing notes and merges the
//! rendered metadata into every entry's note.
//!
//! Each path belongs to at most one id for the whole pass: a managed note owns
//! its path, and an entry whose name collides with another id's note fails
//! instead of merging into it.

use super::report::{EntryFailure, RenameFailure, SyncReport};
use super::SyncError;
use crate::models::NoteTemplateSettings;
use crate::notes::file_ops::with_md_extension;
use crate::notes::frontmatter::merge_metadata;
use crate::notes::{Metadata, Vault};
use crate::template::frontmatter::{ID_KEY, MARKER_KEY, MARKER_VALUE};
use crate::template::{build_frontmatter, entry_context, TemplateEngine};
use anilist_types::MediaListEntry;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Entry id of a managed note, `None` for anything else
pub fn managed_id(metadata: &Metadata) -> Option<i64> {
    if metadata.get(MARKER_KEY).and_then(Value::as_str) != Some(MARKER_VALUE) {
        return None;
    }
    match metadata.get(ID_KEY)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Check a rendered file name and give it the `.md` extension. The name must
/// stay a single visible file directly in the folder.
fn note_file_name(rendered: &str) -> Result<String, SyncError> {
    let name = rendered.trim();
    if name.is_empty() {
        return Err(SyncError::Template(
            "file name template rendered an empty name".to_string(),
        ));
    }
    if name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(SyncError::Template(format!(
            "file name template rendered an invalid name '{}'",
            name
        )));
    }
    Ok(with_md_extension(name))
}

pub struct Reconciler {
    vault: Arc<dyn Vault>,
    engine: Arc<TemplateEngine>,
}

impl Reconciler {
    pub fn new(vault: Arc<dyn Vault>, engine: Arc<TemplateEngine>) -> Self {
        Self { vault, engine }
    }

    pub async fn reconcile(
        &self,
        entries: &[MediaListEntry],
        templates: &NoteTemplateSettings,
        respect_user_renames: bool,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let dir = PathBuf::from(templates.file_dir.trim().trim_matches('/'));

        // Last occurrence of an id wins; the survivors keep list order
        let index: HashMap<i64, usize> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.id, position))
            .collect();
        let selected: Vec<usize> = (0..entries.len())
            .filter(|&position| index[&entries[position].id] == position)
            .collect();
        let contexts: HashMap<usize, Value> = selected
            .iter()
            .map(|&position| (position, entry_context(&entries[position])))
            .collect();

        let managed = self.managed_notes(&dir).await;
        let mut owners: HashMap<PathBuf, i64> = managed.iter().map(|(path, id)| (path.clone(), *id)).collect();

        // Where each entry's note lives once the rename pass is done
        let mut located: HashMap<i64, PathBuf> = HashMap::new();
        for (path, id) in managed {
            let Some(position) = index.get(&id) else {
                continue;
            };
            if let Some(first) = located.get(&id) {
                log::warn!(
                    "[SYNC] {} is a second note for entry {}, keeping {}",
                    path.display(),
                    id,
                    first.display()
                );
                continue;
            }
            if respect_user_renames {
                located.insert(id, path);
                continue;
            }

            // An unrenderable name is reported by the update pass
            let Ok(target) = self.target_path(&dir, templates, &contexts[position]) else {
                continue;
            };
            if path == target {
                located.insert(id, path);
                continue;
            }
            match self.vault.rename(&path, &target).await {
                Ok(()) => {
                    log::info!("[SYNC] Renamed {} -> {}", path.display(), target.display());
                    report.renamed += 1;
                    owners.remove(&path);
                    owners.insert(target.clone(), id);
                    located.insert(id, target);
                }
                Err(e) => {
                    log::warn!("[SYNC] Could not rename {} -> {}: {}", path.display(), target.display(), e);
                    report.rename_failures.push(RenameFailure {
                        from: path.clone(),
                        to: target,
                        error: e.to_string(),
                    });
                    located.insert(id, path);
                }
            }
        }

        for position in selected {
            let entry = &entries[position];
            let context = &contexts[&position];
            let result = match self.claim_path(&dir, templates, context, entry.id, &located, &mut owners) {
                Ok(path) => self.sync_entry(&path, templates, context).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    log::error!("[SYNC] Failed to sync entry {}: {}", entry.id, e);
                    report.failures.push(EntryFailure {
                        entry_id: entry.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.is_noop() && !report.has_failures() {
            log::debug!("[SYNC] {}: already up to date", dir.display());
        }
        log::info!("[SYNC] {}: {}", dir.display(), report);
        report
    }

    /// Every managed note directly in `dir`, sorted by path
    async fn managed_notes(&self, dir: &Path) -> Vec<(PathBuf, i64)> {
        let paths = match self.vault.list_notes(dir).await {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("[SYNC] Could not list notes in {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut managed = Vec::new();
        for path in paths {
            match self.vault.read_metadata(&path).await {
                Ok(metadata) => {
                    if let Some(id) = managed_id(&metadata) {
                        managed.push((path, id));
                    }
                }
                Err(e) => log::warn!("[SYNC] Skipping {}: {}", path.display(), e),
            }
        }
        managed
    }

    fn target_path(
        &self,
        dir: &Path,
        templates: &NoteTemplateSettings,
        context: &Value,
    ) -> Result<PathBuf, SyncError> {
        let rendered = self.engine.render(&templates.file_name_template, context);
        Ok(dir.join(note_file_name(&rendered)?))
    }

    /// The entry's note path, reserved for `id` until the pass ends
    fn claim_path(
        &self,
        dir: &Path,
        templates: &NoteTemplateSettings,
        context: &Value,
        id: i64,
        located: &HashMap<i64, PathBuf>,
        owners: &mut HashMap<PathBuf, i64>,
    ) -> Result<PathBuf, SyncError> {
        let path = match located.get(&id) {
            Some(path) => path.clone(),
            None => self.target_path(dir, templates, context)?,
        };
        match owners.get(&path) {
            Some(&owner) if owner != id => Err(SyncError::PathTaken { path, owner }),
            _ => {
                owners.insert(path.clone(), id);
                Ok(path)
            }
        }
    }

    async fn sync_entry(
        &self,
        path: &Path,
        templates: &NoteTemplateSettings,
        context: &Value,
    ) -> Result<Outcome, SyncError> {
        let mut created = false;
        if !self.vault.exists(path).await? {
            let body = self.engine.render(&templates.body_template, context);
            self.vault.create(path, &body).await?;
            created = true;
        }

        let rendered = build_frontmatter(&self.engine, &templates.front_matter, context).to_metadata();
        let current = self.vault.read_metadata(path).await?;
        let (merged, changed) = merge_metadata(&current, &rendered);
        if changed {
            self.vault.write_metadata(path, &merged).await?;
        }

        Ok(match (created, changed) {
            (true, _) => Outcome::Created,
            (false, true) => Outcome::Updated,
            (false, false) => Outcome::Unchanged,
        })
    }
}
