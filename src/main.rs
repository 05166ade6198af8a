//! village-guardian entry point.
//!
//! Parses CLI flags, loads the profile's config and persisted state,
//! wires the planners and the browser-driver placeholder together, then
//! runs the orchestrator, the HTTP/WS control surface, and the bot
//! protection monitor as independently cancellable tasks under a single
//! supervisor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use village_guardian::api::{self, ApiState};
use village_guardian::browser::{BrowserDriver, Extractor, UnconfiguredDriver};
use village_guardian::building::{BuildMode, BuildingPlanner};
use village_guardian::config;
use village_guardian::farm::FarmRunner;
use village_guardian::humanizer::Humanizer;
use village_guardian::models::WorldConfig;
use village_guardian::orchestrator::{ActionDispatcher, Orchestrator};
use village_guardian::panel::{PanelProjection, PanelStateStore};
use village_guardian::protection::{self, ProtectionMonitor};
use village_guardian::scavenge::ScavengePlanner;
use village_guardian::storage::ProcessLock;
use village_guardian::troops::TroopRecruiter;

#[derive(Parser, Debug)]
#[command(name = "village-guardian")]
#[command(about = "Humanized automation guardian for a browser-based village strategy game")]
#[command(version)]
struct CliArgs {
    /// Isolates config, data, and logs under `data/<profile>/`.
    #[arg(long, default_value = "default")]
    profile: String,

    /// Force headless + API mode, independent of the config file's `api.enabled`.
    #[arg(long)]
    headless: bool,

    /// HTTP/WS port for the control API. Implies `--headless`.
    #[arg(long)]
    api_port: Option<u16>,
}

/// Task identification for supervisor logging.
#[derive(Debug, Clone, Copy)]
enum TaskName {
    Orchestrator,
    HttpApi,
    ProtectionMonitor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Orchestrator => write!(f, "Orchestrator"),
            TaskName::HttpApi => write!(f, "HttpApi"),
            TaskName::ProtectionMonitor => write!(f, "ProtectionMonitor"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let data_dir = PathBuf::from("data").join(&args.profile);
    let config_path = data_dir.join("config.toml");

    let mut app_config = config::load_config(&config_path).context("failed to load config")?;
    if args.headless || args.api_port.is_some() {
        app_config.api.enabled = true;
    }
    if let Some(port) = args.api_port {
        app_config.api.port = port;
    }

    info!(profile = %args.profile, data_dir = %data_dir.display(), "village-guardian starting");

    let _process_lock =
        ProcessLock::acquire(&data_dir).context("failed to acquire process lock — another instance running?")?;

    let humanizer = Humanizer::new(app_config.humanizer.clone());

    let driver: Arc<Mutex<Box<dyn BrowserDriver>>> = Arc::new(Mutex::new(Box::new(UnconfiguredDriver)));
    let extractor: Arc<dyn Extractor> = Arc::new(UnconfiguredDriver);

    // No real browser backend is wired in yet (see `browser.rs`), so the
    // world config and village roster can't actually be read from the
    // game. Fall back to defaults rather than fail startup — the bot
    // still links, serves the panel/API, and waits for a real driver.
    let world = match extractor.world_config().await {
        Ok(world) => world,
        Err(err) => {
            warn!(error = %err, "world config unavailable, using defaults");
            WorldConfig::default()
        }
    };
    config::init_world(world);

    let carries: HashMap<String, i64> =
        config::world().units.iter().map(|(name, info)| (name.clone(), info.carry)).collect();

    let village_ids = match extractor.village_ids(0).await {
        Ok(ids) if !ids.is_empty() => ids,
        Ok(_) => {
            warn!("no villages discovered; waiting for a configured browser backend");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, "village discovery failed; starting with an empty roster");
            Vec::new()
        }
    };

    let building = match BuildingPlanner::from_template(&app_config.building, &PathBuf::from(".")) {
        Ok(planner) => planner,
        Err(err) => {
            warn!(error = %err, template = %app_config.building.template, "building template unavailable, starting with an empty queue");
            BuildingPlanner::new(BuildMode::Sequential(Vec::new()))
        }
    };
    let troops = TroopRecruiter::new(app_config.troops.clone());
    let farm = FarmRunner::new(app_config.farming.clone(), config::world().carry_for("light"));
    let scavenge = ScavengePlanner::new(app_config.scavenging.clone(), carries);

    let panel = Arc::new(PanelStateStore::new());
    let projection = Arc::new(PanelProjection::new());
    let running = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(false));
    let protection_detected = Arc::new(AtomicBool::new(false));
    let protection_resolve = Arc::new(Notify::new());
    let wake = Arc::new(Notify::new());
    let cancel = CancellationToken::new();

    let dispatch = ActionDispatcher {
        config: Arc::new(RwLock::new(app_config.clone())),
        panel: panel.clone(),
        projection: projection.clone(),
        running: running.clone(),
        paused: paused.clone(),
        protection_detected: protection_detected.clone(),
        protection_resolve: protection_resolve.clone(),
        wake: wake.clone(),
        data_dir: data_dir.clone(),
    };

    let mut orchestrator = Orchestrator::new(
        dispatch.clone(),
        driver.clone(),
        extractor.clone(),
        humanizer,
        cancel.clone(),
        village_ids,
        building,
        troops,
        farm,
        scavenge,
    );
    orchestrator.load_persisted_state().await;

    let protection_monitor = ProtectionMonitor::new(app_config.telegram.clone(), &app_config.bot_protection);

    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received ctrl-c, shutting down");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let orchestrator_cancel = cancel.clone();
    task_set.spawn(async move {
        tokio::select! {
            _ = orchestrator.run() => {}
            _ = orchestrator_cancel.cancelled() => {}
        }
        Ok(TaskName::Orchestrator)
    });

    if app_config.api.enabled {
        let addr = format!("{}:{}", app_config.api.host, app_config.api.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind API listener on {addr}"))?;
        info!(%addr, "API listening");

        let api_state = ApiState::new(dispatch.clone(), args.profile.clone(), config_path.clone());
        let app = api::create_app(api_state);
        let http_cancel = cancel.clone();

        task_set.spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    http_cancel.cancelled().await;
                })
                .await;
            match result {
                Ok(()) => Ok(TaskName::HttpApi),
                Err(err) => Err(anyhow::anyhow!("API server error: {err}")),
            }
        });
    } else {
        info!("API disabled; run with --headless or --api-port to expose it");
    }

    let protection_cancel = cancel.clone();
    let protection_driver = driver.clone();
    let protection_panel = panel.clone();
    let protection_running = dispatch.running.clone();
    let protection_resolve_signal = dispatch.protection_resolve.clone();
    task_set.spawn(async move {
        protection::run_periodic(
            protection_monitor,
            protection_driver,
            protection_running,
            protection_panel,
            protection_resolve_signal,
            protection_cancel,
        )
        .await;
        Ok(TaskName::ProtectionMonitor)
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(name))) => info!(task = %name, "task completed normally"),
                    Some(Ok(Err(err))) => {
                        error!(error = %err, "task failed");
                        cancel.cancel();
                        return Err(err);
                    }
                    Some(Err(err)) => {
                        error!(error = %err, "task panicked");
                        cancel.cancel();
                        return Err(anyhow::anyhow!("task panicked: {err}"));
                    }
                    None => {
                        info!("supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    info!("village-guardian shutdown complete");
    Ok(())
}
