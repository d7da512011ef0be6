//! Sync settings model backed by a RON file.
//!
//! Holds the per-kind note templates, fetch options and scheduling.
//! Loaded from `config/sync_config.ron`; written with defaults when missing.

use crate::anilist::FetchOptions;
use crate::config::ConfigError;
use crate::template::{FieldType, FrontmatterEntry};
use anilist_types::ListKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_FILE_NAME_TEMPLATE: &str = "{{title|safe_name}} ({{media_type|capitalize}}, {{id}}).md";
pub const DEFAULT_BODY_TEMPLATE: &str =
    "{{synopsis|strip_html|callout:(\"summary\", \"Synopsis\", true)}}\n";

/// How notes of one list kind are named, where they live and what they contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTemplateSettings {
    /// Folder relative to the vault root
    pub file_dir: String,
    #[serde(default = "default_file_name_template")]
    pub file_name_template: String,
    #[serde(default)]
    pub front_matter: Vec<FrontmatterEntry>,
    #[serde(default)]
    pub body_template: String,
}

impl NoteTemplateSettings {
    pub fn anime() -> Self {
        Self {
            file_dir: "AL/Anime".to_string(),
            file_name_template: DEFAULT_FILE_NAME_TEMPLATE.to_string(),
            front_matter: vec![
                FrontmatterEntry::new("title", "{{title}}", FieldType::Text),
                FrontmatterEntry::new("media_type", "{{media_type}}", FieldType::Text),
                FrontmatterEntry::new("score", "{{score}}", FieldType::Number),
                FrontmatterEntry::new("watch_status", "{{watch_status}}", FieldType::Text),
                FrontmatterEntry::new("episodes", "{{episodes}}", FieldType::Number),
                FrontmatterEntry::new("genres", "{{genres}}", FieldType::List),
                FrontmatterEntry::new("studios", "{{studios}}", FieldType::List),
            ],
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }

    pub fn manga() -> Self {
        Self {
            file_dir: "AL/Manga".to_string(),
            file_name_template: DEFAULT_FILE_NAME_TEMPLATE.to_string(),
            front_matter: vec![
                FrontmatterEntry::new("title", "{{title}}", FieldType::Text),
                FrontmatterEntry::new("mal_id", "{{id_mal}}", FieldType::Number),
                FrontmatterEntry::new("score", "{{score}}", FieldType::Number),
                FrontmatterEntry::new("read_status", "{{user_status}}", FieldType::Text),
                FrontmatterEntry::new("chapters", "{{chapters}}", FieldType::Number),
                FrontmatterEntry::new("genres", "{{genres}}", FieldType::List),
            ],
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }
}

/// User-supplied `MediaListCollection` queries replacing the built-in one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomQueries {
    #[serde(default)]
    pub anime: Option<String>,
    #[serde(default)]
    pub manga: Option<String>,
}

/// Top-level sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// AniList user whose lists are synced; the token's account when unset
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Leave managed notes under whatever name the user gave them
    #[serde(default)]
    pub respect_user_renames: bool,
    #[serde(default = "NoteTemplateSettings::anime")]
    pub anime: NoteTemplateSettings,
    #[serde(default = "NoteTemplateSettings::manga")]
    pub manga: NoteTemplateSettings,
    #[serde(default)]
    pub fetch_options: FetchOptions,
    #[serde(default)]
    pub custom_queries: CustomQueries,
    /// One extra request per entry to fetch relation edges
    #[serde(default)]
    pub enrich_relations: bool,
    #[serde(default = "default_enrich_delay_ms")]
    pub enrich_delay_ms: u64,
    #[serde(default)]
    pub sync_on_startup: bool,
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    #[serde(default)]
    pub background_sync: bool,
    #[serde(default = "default_background_interval_minutes")]
    pub background_interval_minutes: u64,
}

fn default_file_name_template() -> String { DEFAULT_FILE_NAME_TEMPLATE.to_string() }
fn default_enrich_delay_ms() -> u64 { 700 }
fn default_startup_delay_secs() -> u64 { 5 }
fn default_background_interval_minutes() -> u64 { 60 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            respect_user_renames: false,
            anime: NoteTemplateSettings::anime(),
            manga: NoteTemplateSettings::manga(),
            fetch_options: FetchOptions {
                include_studios: true,
                ..Default::default()
            },
            custom_queries: CustomQueries::default(),
            enrich_relations: false,
            enrich_delay_ms: default_enrich_delay_ms(),
            sync_on_startup: false,
            startup_delay_secs: default_startup_delay_secs(),
            background_sync: false,
            background_interval_minutes: default_background_interval_minutes(),
        }
    }
}

impl SyncConfig {
    /// Load from `path`. A missing file is created with the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[SYNC] No settings at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config = ron::from_str::<SyncConfig>(&content).map_err(|e| ConfigError::Ron {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON and write to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let pretty = ron::ser::PrettyConfig::default();
        let content = ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize sync settings: {}", e)))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, templates) in [(ListKind::Anime, &self.anime), (ListKind::Manga, &self.manga)] {
            if templates.file_name_template.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} file_name_template is empty", kind)));
            }
        }
        if self.background_sync && self.background_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "background_interval_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn templates(&self, kind: ListKind) -> &NoteTemplateSettings {
        match kind {
            ListKind::Anime => &self.anime,
            ListKind::Manga => &self.manga,
        }
    }

    pub fn custom_query(&self, kind: ListKind) -> Option<&str> {
        let query = match kind {
            ListKind::Anime => self.custom_queries.anime.as_deref(),
            ListKind::Manga => self.custom_queries.manga.as_deref(),
        };
        query.filter(|q| !q.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config/sync_config.ron");

        let config = SyncConfig::load_from(&path).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(path.exists());

        let reloaded = SyncConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_config.ron");
        std::fs::write(&path, "(respect_user_renames: true, user_id: Some(42))").unwrap();

        let config = SyncConfig::load_from(&path).unwrap();
        assert!(config.respect_user_renames);
        assert_eq!(config.user_id, Some(42));
        assert_eq!(config.anime.file_dir, "AL/Anime");
        assert_eq!(config.background_interval_minutes, 60);
    }

    #[test]
    fn test_custom_template_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_config.ron");
        std::fs::write(
            &path,
            r#"(
                anime: (
                    file_dir: "Media/Anime",
                    front_matter: [
                        (key: "genres", value: "{{#genres}}", type: list),
                    ],
                ),
                custom_queries: (manga: Some("query { custom }")),
            )"#,
        )
        .unwrap();

        let config = SyncConfig::load_from(&path).unwrap();
        let anime = config.templates(ListKind::Anime);
        assert_eq!(anime.file_dir, "Media/Anime");
        assert_eq!(anime.file_name_template, DEFAULT_FILE_NAME_TEMPLATE);
        assert_eq!(anime.front_matter[0].field_type, FieldType::List);
        assert!(anime.body_template.is_empty());
        assert_eq!(config.custom_query(ListKind::Manga), Some("query { custom }"));
        assert_eq!(config.custom_query(ListKind::Anime), None);
    }

    #[test]
    fn test_invalid_files_are_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync_config.ron");

        std::fs::write(&path, "(respect_user_renames: maybe)").unwrap();
        assert!(matches!(SyncConfig::load_from(&path), Err(ConfigError::Ron { .. })));

        std::fs::write(&path, "(background_sync: true, background_interval_minutes: 0)").unwrap();
        assert!(matches!(SyncConfig::load_from(&path), Err(ConfigError::Invalid(_))));
    }
}
