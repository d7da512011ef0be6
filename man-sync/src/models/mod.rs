pub mod sync_config;

pub use sync_config::{NoteTemplateSettings, SyncConfig};
