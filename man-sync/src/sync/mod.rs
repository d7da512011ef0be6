//! Sync runner: load settings, fetch a list, reconcile it into the vault and
//! tell the user how it went.

pub mod notify;
pub mod reconcile;
pub mod report;
pub mod scheduler;

pub use notify::{Level, LogNotifier, Notifier};
pub use reconcile::Reconciler;
pub use report::SyncReport;
pub use scheduler::Scheduler;

use crate::anilist::AniListError;
use crate::config::ConfigError;
use crate::models::SyncConfig;
use crate::notes::{Vault, VaultError};
use crate::template::TemplateEngine;
use anilist_types::{ListKind, MediaListEntry};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] AniListError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("template error: {0}")]
    Template(String),
    #[error("{} already belongs to entry {}", .path.display(), .owner)]
    PathTaken { path: PathBuf, owner: i64 },
}

/// Where list entries come from
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_entries(&self, kind: ListKind, config: &SyncConfig) -> Result<Vec<MediaListEntry>, AniListError>;
}

/// Which lists one sync covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SyncTarget {
    Anime,
    Manga,
    All,
}

impl SyncTarget {
    pub fn kinds(self) -> &'static [ListKind] {
        match self {
            SyncTarget::Anime => &[ListKind::Anime],
            SyncTarget::Manga => &[ListKind::Manga],
            SyncTarget::All => &[ListKind::Anime, ListKind::Manga],
        }
    }
}

pub struct SyncRunner {
    source: Arc<dyn ListSource>,
    reconciler: Reconciler,
    notifier: Arc<dyn Notifier>,
    config_path: PathBuf,
}

impl SyncRunner {
    pub fn new(
        source: Arc<dyn ListSource>,
        vault: Arc<dyn Vault>,
        engine: Arc<TemplateEngine>,
        notifier: Arc<dyn Notifier>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(vault, engine),
            notifier,
            config_path,
        }
    }

    /// Settings are read once per sync and stay fixed for its duration
    pub fn load_config(&self) -> Result<SyncConfig, ConfigError> {
        SyncConfig::load_from(&self.config_path)
    }

    /// Sync every list of `target`. A list whose fetch fails is reported and
    /// skipped; the call fails only when the settings cannot be loaded or no
    /// list could be synced.
    pub async fn run_sync(&self, target: SyncTarget) -> Result<Vec<SyncReport>, SyncError> {
        let config = match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                self.notifier
                    .notify(Level::Error, &format!("Could not load sync settings: {}", e))
                    .await;
                return Err(e.into());
            }
        };

        let mut reports = Vec::new();
        let mut last_error = None;
        for &kind in target.kinds() {
            match self.sync_kind(kind, &config).await {
                Ok(report) => reports.push(report),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if reports.is_empty() => Err(e),
            _ => Ok(reports),
        }
    }

    async fn sync_kind(&self, kind: ListKind, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        log::info!("[SYNC] Starting {} sync", kind);

        let entries = match self.source.fetch_entries(kind, config).await {
            Ok(entries) => entries,
            Err(e) => {
                self.notifier
                    .notify(Level::Error, &format!("Failed to fetch {} list: {}", kind, e))
                    .await;
                return Err(e.into());
            }
        };

        let report = self
            .reconciler
            .reconcile(&entries, config.templates(kind), config.respect_user_renames)
            .await;

        if report.has_failures() {
            self.notifier
                .notify(
                    Level::Warning,
                    &format!("Some {} notes could not be synced:\n{}", kind, report.failure_summary()),
                )
                .await;
        }
        self.notifier
            .notify(Level::Info, &format!("{} sync finished: {}", kind, report))
            .await;

        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::notes::FsVault;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    pub(crate) struct FakeSource {
        pub anime: Option<Vec<MediaListEntry>>,
        pub manga: Option<Vec<MediaListEntry>>,
        pub calls: Mutex<usize>,
    }

    #[async_trait]
    impl ListSource for FakeSource {
        async fn fetch_entries(&self, kind: ListKind, _config: &SyncConfig) -> Result<Vec<MediaListEntry>, AniListError> {
            *self.calls.lock() += 1;
            let entries = match kind {
                ListKind::Anime => &self.anime,
                ListKind::Manga => &self.manga,
            };
            entries
                .clone()
                .ok_or_else(|| AniListError::GraphQl("Invalid token".to_string()))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub messages: Mutex<Vec<(Level, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, level: Level, message: &str) {
            self.messages.lock().push((level, message.to_string()));
        }
    }

    pub(crate) fn anime_entry(id: i64, title: &str) -> MediaListEntry {
        serde_json::from_value(json!({
            "id": id,
            "status": "CURRENT",
            "media": { "id": id + 1000, "title": { "userPreferred": title }, "format": "TV" }
        }))
        .unwrap()
    }

    pub(crate) fn runner(
        root: &Path,
        source: FakeSource,
    ) -> (SyncRunner, Arc<FakeSource>, Arc<RecordingNotifier>) {
        let source = Arc::new(source);
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = SyncRunner::new(
            source.clone(),
            Arc::new(FsVault::new(root.join("vault"))),
            Arc::new(TemplateEngine::default()),
            notifier.clone(),
            root.join("config/sync_config.ron"),
        );
        (runner, source, notifier)
    }

    #[tokio::test]
    async fn test_run_sync_with_default_settings() {
        let dir = tempdir().unwrap();
        let source = FakeSource {
            anime: Some(vec![anime_entry(101, "Show A")]),
            manga: None,
            calls: Mutex::new(0),
        };
        let (runner, _, notifier) = runner(dir.path(), source);

        let reports = runner.run_sync(SyncTarget::Anime).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].created, 1);

        assert!(dir.path().join("config/sync_config.ron").exists());
        let note = dir.path().join("vault/AL/Anime/Show A (Tv, 101).md");
        let content = std::fs::read_to_string(note).unwrap();
        assert!(content.contains("watch_status: CURRENT"));

        let messages = notifier.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Level::Info);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_reconciliation() {
        let dir = tempdir().unwrap();
        let source = FakeSource {
            anime: None,
            manga: None,
            calls: Mutex::new(0),
        };
        let (runner, _, notifier) = runner(dir.path(), source);

        let err = runner.run_sync(SyncTarget::Anime).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(AniListError::GraphQl(_))));
        assert!(!dir.path().join("vault").exists());

        let messages = notifier.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Level::Error);
        assert!(messages[0].1.contains("Invalid token"));
    }

    #[tokio::test]
    async fn test_all_continues_past_failed_list() {
        let dir = tempdir().unwrap();
        let source = FakeSource {
            anime: None,
            manga: Some(vec![anime_entry(5, "Book")]),
            calls: Mutex::new(0),
        };
        let (runner, source, _) = runner(dir.path(), source);

        let reports = runner.run_sync(SyncTarget::All).await.unwrap();
        assert_eq!(*source.calls.lock(), 2);
        assert_eq!(reports.len(), 1);
        assert!(dir.path().join("vault/AL/Manga/Book (Tv, 5).md").exists());
    }

    #[tokio::test]
    async fn test_invalid_settings_abort_before_fetch() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/sync_config.ron"), "(oops").unwrap();
        let source = FakeSource {
            anime: Some(Vec::new()),
            manga: None,
            calls: Mutex::new(0),
        };
        let (runner, source, _) = runner(dir.path(), source);

        let err = runner.run_sync(SyncTarget::Anime).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::Ron { .. })));
        assert_eq!(*source.calls.lock(), 0);
    }

    #[test]
    fn test_sync_target_parse() {
        assert_eq!("all".parse::<SyncTarget>().unwrap(), SyncTarget::All);
        assert_eq!(SyncTarget::Manga.kinds(), &[ListKind::Manga]);
        assert!("books".parse::<SyncTarget>().is_err());
    }
}
