use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable names - single source of truth
pub mod env_vars {
    /// AniList OAuth access token. Needed to resolve the user via `Viewer`
    /// and to read private lists.
    pub const ANILIST_TOKEN: &str = "ANILIST_TOKEN";
    /// Numeric AniList user id; skips the `Viewer` lookup when set.
    pub const ANILIST_USER_ID: &str = "ANILIST_USER_ID";
    pub const ANILIST_ENDPOINT: &str = "ANILIST_ENDPOINT";
    /// Root of the markdown vault the notes are written into.
    pub const VAULT_DIR: &str = "VAULT_DIR";
    /// Override for the RON sync settings file.
    pub const SYNC_CONFIG_PATH: &str = "SYNC_CONFIG_PATH";
}

/// Default values
pub mod defaults {
    pub const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";
    pub const VAULT_DIR: &str = "vault";
    pub const CONFIG_DIR: &str = "config";
    pub const SYNC_CONFIG_FILE: &str = "sync_config.ron";
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {}", .path.display(), .source)]
    Ron {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Returns the absolute path to the man-sync crate directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// to man-sync/ regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Get the sync settings directory (inside man-sync)
pub fn sync_config_dir() -> PathBuf {
    backend_dir().join(defaults::CONFIG_DIR)
}

/// Get the runtime sync_config.ron path
pub fn sync_config_path() -> PathBuf {
    match env::var(env_vars::SYNC_CONFIG_PATH) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => sync_config_dir().join(defaults::SYNC_CONFIG_FILE),
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub anilist_endpoint: String,
    pub access_token: Option<String>,
    pub user_id: Option<i64>,
    pub vault_dir: PathBuf,
    pub sync_config_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = non_empty(env::var(env_vars::ANILIST_TOKEN).ok());

        let user_id = match non_empty(env::var(env_vars::ANILIST_USER_ID).ok()) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", env_vars::ANILIST_USER_ID, raw))
            })?),
            None => None,
        };

        let anilist_endpoint = non_empty(env::var(env_vars::ANILIST_ENDPOINT).ok())
            .unwrap_or_else(|| defaults::ANILIST_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        let vault_dir = non_empty(env::var(env_vars::VAULT_DIR).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| backend_dir().join(defaults::VAULT_DIR));

        Ok(Self {
            anilist_endpoint,
            access_token,
            user_id,
            vault_dir,
            sync_config_path: sync_config_path(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
