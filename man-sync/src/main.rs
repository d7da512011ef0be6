use dotenv::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod anilist;
mod config;
mod http;
mod models;
mod notes;
mod sync;
mod template;

use anilist::AniListClient;
use config::Config;
use models::SyncConfig;
use notes::FsVault;
use sync::scheduler::SchedulerConfig;
use sync::{LogNotifier, Scheduler, SyncRunner, SyncTarget};
use template::{FilterRegistry, SystemClock, TemplateEngine};

const USAGE: &str = "usage: man-sync [anime|manga|all] [--once]";

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let mut target = SyncTarget::All;
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return;
            }
            other => match other.parse::<SyncTarget>() {
                Ok(parsed) => target = parsed,
                Err(_) => {
                    eprintln!("unknown argument '{}'\n{}", other, USAGE);
                    std::process::exit(2);
                }
            },
        }
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // Validate the settings file up front; each sync re-reads it
    let settings = match SyncConfig::load_from(&config.sync_config_path) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if config.access_token.is_none() && config.user_id.is_none() && settings.user_id.is_none() {
        log::error!(
            "Set {} or {} (or user_id in {})",
            config::env_vars::ANILIST_TOKEN,
            config::env_vars::ANILIST_USER_ID,
            config.sync_config_path.display()
        );
        std::process::exit(1);
    }

    let client = match AniListClient::new(&config.anilist_endpoint, config.access_token.clone()) {
        Ok(client) => client.with_user_id(config.user_id),
        Err(e) => {
            log::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Vault: {}", config.vault_dir.display());
    log::info!("Sync settings: {}", config.sync_config_path.display());

    let engine = TemplateEngine::new(FilterRegistry::builtin().with_clock(Arc::new(SystemClock)));
    let runner = Arc::new(SyncRunner::new(
        Arc::new(client),
        Arc::new(FsVault::new(config.vault_dir.clone())),
        Arc::new(engine),
        Arc::new(LogNotifier),
        config.sync_config_path.clone(),
    ));

    let schedule = SchedulerConfig::from(&settings);
    if once || schedule.is_idle() {
        if let Err(e) = runner.run_sync(target).await {
            log::warn!("Sync did not complete: {}", e);
        }
        return;
    }

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, stopping after the current sync");
            ctrl_c.cancel();
        }
    });

    Scheduler::new(runner, target, schedule).run(shutdown).await;
}
