//! Startup and background sync triggers.
//!
//! All runs happen one after another in the scheduler's task, so two syncs
//! never overlap. Cancellation is observed between runs only.

use super::{SyncRunner, SyncTarget};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Trigger settings, taken from the sync settings when the scheduler starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub sync_on_startup: bool,
    pub startup_delay: Duration,
    pub background_sync: bool,
    pub background_interval: Duration,
}

impl SchedulerConfig {
    pub fn is_idle(&self) -> bool {
        !self.sync_on_startup && !self.background_sync
    }
}

impl From<&crate::models::SyncConfig> for SchedulerConfig {
    fn from(config: &crate::models::SyncConfig) -> Self {
        Self {
            sync_on_startup: config.sync_on_startup,
            startup_delay: Duration::from_secs(config.startup_delay_secs),
            background_sync: config.background_sync,
            background_interval: Duration::from_secs(config.background_interval_minutes.max(1) * 60),
        }
    }
}

pub struct Scheduler {
    runner: Arc<SyncRunner>,
    target: SyncTarget,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(runner: Arc<SyncRunner>, target: SyncTarget, config: SchedulerConfig) -> Self {
        Self { runner, target, config }
    }

    /// Run until the triggers are exhausted or `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        if self.config.sync_on_startup {
            log::info!("[SYNC] Startup sync in {}s", self.config.startup_delay.as_secs());
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.config.startup_delay) => {}
            }
            self.run_once().await;
        }

        if !self.config.background_sync {
            return;
        }

        let period = self.config.background_interval;
        log::info!("[SYNC] Background sync every {} minutes", period.as_secs() / 60);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => self.run_once().await,
            }
        }
        log::info!("[SYNC] Background sync stopped");
    }

    pub async fn run_once(&self) {
        match self.runner.run_sync(self.target).await {
            Ok(reports) => log::debug!("[SYNC] {} run produced {} reports", self.target, reports.len()),
            Err(e) => log::warn!("[SYNC] {} sync failed: {}", self.target, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{anime_entry, runner, FakeSource};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    fn source() -> FakeSource {
        FakeSource {
            anime: Some(vec![anime_entry(1, "Show")]),
            manga: None,
            calls: Mutex::new(0),
        }
    }

    #[tokio::test]
    async fn test_startup_sync_runs_once() {
        let dir = tempdir().unwrap();
        let (runner, source, _) = runner(dir.path(), source());
        let config = SchedulerConfig {
            sync_on_startup: true,
            startup_delay: Duration::ZERO,
            background_sync: false,
            background_interval: Duration::from_secs(60),
        };

        Scheduler::new(Arc::new(runner), SyncTarget::Anime, config)
            .run(CancellationToken::new())
            .await;
        assert_eq!(*source.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_scheduler_stops_without_running() {
        let dir = tempdir().unwrap();
        let (runner, source, _) = runner(dir.path(), source());
        let config = SchedulerConfig {
            sync_on_startup: true,
            startup_delay: Duration::from_secs(3600),
            background_sync: true,
            background_interval: Duration::from_secs(3600),
        };

        let token = CancellationToken::new();
        token.cancel();
        Scheduler::new(Arc::new(runner), SyncTarget::Anime, config)
            .run(token)
            .await;
        assert_eq!(*source.calls.lock(), 0);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = crate::models::SyncConfig {
            background_sync: true,
            background_interval_minutes: 0,
            ..Default::default()
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.background_interval, Duration::from_secs(60));
        assert_eq!(config.startup_delay, Duration::from_secs(5));
        assert!(!config.is_idle());
    }
}
