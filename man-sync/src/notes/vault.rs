//! Vault abstraction: the note storage the reconciler reads and mutates.
//!
//! Paths are relative to the vault root. Metadata updates are a two-phase
//! contract: `read_metadata`, merge, then `write_metadata`.

use super::file_ops;
use super::frontmatter::{self, Metadata};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid metadata in {}: {}", .path.display(), .source)]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("note not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("note already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

impl VaultError {
    fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => VaultError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => VaultError::AlreadyExists(path.to_path_buf()),
            _ => VaultError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    fn yaml(path: &Path, source: serde_yaml::Error) -> Self {
        VaultError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
pub trait Vault: Send + Sync {
    /// Markdown notes directly inside `dir`, sorted
    async fn list_notes(&self, dir: &Path) -> Result<Vec<PathBuf>, VaultError>;

    async fn exists(&self, path: &Path) -> Result<bool, VaultError>;

    /// Create a note with `body` and no metadata; fails if it exists
    async fn create(&self, path: &Path, body: &str) -> Result<(), VaultError>;

    async fn read_metadata(&self, path: &Path) -> Result<Metadata, VaultError>;

    /// Replace the note's metadata block, leaving its body untouched
    async fn write_metadata(&self, path: &Path, metadata: &Metadata) -> Result<(), VaultError>;

    /// Move a note; fails if the destination exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), VaultError>;
}

/// Vault backed by a directory on the local filesystem
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    async fn read(&self, path: &Path) -> Result<String, VaultError> {
        fs::read_to_string(self.resolve(path))
            .await
            .map_err(|e| VaultError::io(path, e))
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn list_notes(&self, dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
        let absolute = self.resolve(dir);
        let files = tokio::task::spawn_blocking(move || file_ops::list_notes(&absolute))
            .await
            .map_err(io::Error::other)
            .and_then(|listed| listed)
            .map_err(|e| VaultError::io(dir, e))?;
        Ok(files.iter().map(|f| self.relative(f)).collect())
    }

    async fn exists(&self, path: &Path) -> Result<bool, VaultError> {
        fs::try_exists(self.resolve(path))
            .await
            .map_err(|e| VaultError::io(path, e))
    }

    async fn create(&self, path: &Path, body: &str) -> Result<(), VaultError> {
        file_ops::create_note(&self.resolve(path), body)
            .await
            .map_err(|e| VaultError::io(path, e))?;
        log::debug!("[VAULT] Created {}", path.display());
        Ok(())
    }

    async fn read_metadata(&self, path: &Path) -> Result<Metadata, VaultError> {
        let content = self.read(path).await?;
        frontmatter::read_metadata(&content).map_err(|e| VaultError::yaml(path, e))
    }

    async fn write_metadata(&self, path: &Path, metadata: &Metadata) -> Result<(), VaultError> {
        let content = self.read(path).await?;
        let updated =
            frontmatter::replace_metadata(&content, metadata).map_err(|e| VaultError::yaml(path, e))?;
        file_ops::write_note(&self.resolve(path), &updated)
            .await
            .map_err(|e| VaultError::io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), VaultError> {
        let source = self.resolve(from);
        let target = self.resolve(to);

        if !fs::try_exists(&source).await.map_err(|e| VaultError::io(from, e))? {
            return Err(VaultError::NotFound(from.to_path_buf()));
        }
        if fs::try_exists(&target).await.map_err(|e| VaultError::io(to, e))? {
            return Err(VaultError::AlreadyExists(to.to_path_buf()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| VaultError::io(to, e))?;
        }
        fs::rename(&source, &target).await.map_err(|e| VaultError::io(from, e))?;
        log::debug!("[VAULT] Renamed {} -> {}", from.display(), to.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn record(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_read_metadata() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        let path = Path::new("AL/Anime/Show A.md");

        assert!(!vault.exists(path).await.unwrap());
        vault.create(path, "Body").await.unwrap();
        assert!(vault.exists(path).await.unwrap());
        assert!(vault.read_metadata(path).await.unwrap().is_empty());

        let err = vault.create(path, "Again").await.unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_write_metadata_keeps_body() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        let path = Path::new("note.md");
        fs::write(dir.path().join(path), "---\nmyNote: hi\n---\n# Body\n").unwrap();

        let mut metadata = vault.read_metadata(path).await.unwrap();
        metadata.insert("id".into(), json!(7));
        vault.write_metadata(path, &metadata).await.unwrap();

        let content = fs::read_to_string(dir.path().join(path)).unwrap();
        assert_eq!(content, "---\nmyNote: hi\nid: 7\n---\n# Body\n");
        assert_eq!(vault.read_metadata(path).await.unwrap(), record(json!({ "myNote": "hi", "id": 7 })));
    }

    #[tokio::test]
    async fn test_read_metadata_errors() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());

        let err = vault.read_metadata(Path::new("missing.md")).await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));

        fs::write(dir.path().join("broken.md"), "---\nkey: [oops\n---\nbody").unwrap();
        let err = vault.read_metadata(Path::new("broken.md")).await.unwrap_err();
        assert!(matches!(err, VaultError::Yaml { .. }));
    }

    #[tokio::test]
    async fn test_rename() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.create(Path::new("a.md"), "A").await.unwrap();
        vault.create(Path::new("b.md"), "B").await.unwrap();

        let err = vault.rename(Path::new("a.md"), Path::new("b.md")).await.unwrap_err();
        assert!(matches!(err, VaultError::AlreadyExists(_)));

        vault.rename(Path::new("a.md"), Path::new("c.md")).await.unwrap();
        assert!(!vault.exists(Path::new("a.md")).await.unwrap());
        assert_eq!(fs::read_to_string(dir.path().join("c.md")).unwrap(), "A");
    }

    #[tokio::test]
    async fn test_list_notes_relative() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.create(Path::new("AL/Anime/x.md"), "").await.unwrap();
        vault.create(Path::new("AL/Anime/y.md"), "").await.unwrap();

        let notes = vault.list_notes(Path::new("AL/Anime")).await.unwrap();
        assert_eq!(notes, vec![PathBuf::from("AL/Anime/x.md"), PathBuf::from("AL/Anime/y.md")]);
        assert!(vault.list_notes(Path::new("AL/Manga")).await.unwrap().is_empty());
    }
}
