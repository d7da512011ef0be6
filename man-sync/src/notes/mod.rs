//! Notes vault: Obsidian-compatible markdown notes with a YAML metadata block
//!
//! The sync owns only the metadata keys it renders; note bodies and any
//! user-added keys are never rewritten.

pub mod file_ops;
pub mod frontmatter;
pub mod vault;

pub use frontmatter::Metadata;
pub use vault::{FsVault, Vault, VaultError};
