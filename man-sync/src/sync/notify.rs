//! User-facing notifications.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, level: Level, message: &str);
}

/// Notifier that surfaces messages through the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Info => log::info!("[SYNC] {}", message),
            Level::Warning => log::warn!("[SYNC] {}", message),
            Level::Error => log::error!("[SYNC] {}", message),
        }
    }
}
