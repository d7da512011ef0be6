//! File operations for the note vault
//!
//! Handles reading/writing markdown note files and listing a folder's notes.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Append `.md` unless the name already carries it
pub fn with_md_extension(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".md") {
        name.to_string()
    } else {
        format!("{}.md", name)
    }
}

/// Write a note file (creates parent directories as needed)
pub async fn write_note(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}

/// Create a note that must not exist yet
pub async fn create_note(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new().write(true).create_new(true).open(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

/// Markdown files directly inside `dir`, sorted by path. A missing
/// directory has no notes. Blocking; run it off the async workers.
pub fn list_notes(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        // Skip hidden files (like .obsidian)
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "md").unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
