//! The daemon's entry point, exported as a library so it can be integration tested against a
//! real in-process server rather than a spawned binary.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use batchq_lib::manager::TaskManager;
use batchq_lib::settings::Settings;
use log::{info, warn};
use simplelog::{Config, ConfigBuilder, LevelFilter, WriteLogger};

pub mod rpc;

/// Install the daemon's logger. Exposed so callers can bring logging up before anything else
/// (including [`Settings::from_env`]) runs, so that no diagnostic is emitted to a logger that
/// isn't installed yet and silently dropped.
pub fn init_logger(settings: &Settings) -> Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.log_path)
        .with_context(|| format!("failed to open log file {}", settings.log_path.display()))?;

    // Try to log with the local timezone; fall back to UTC if it can't be determined.
    let mut builder = ConfigBuilder::new();
    let config = match builder.set_time_offset_to_local() {
        Err(_) => {
            warn!("Failed to determine the local time of this machine. Fallback to UTC.");
            Config::default()
        }
        Ok(builder) => builder.build(),
    };

    WriteLogger::init(LevelFilter::Info, config, log_file)
        .context("failed to install the daemon's logger")?;

    Ok(())
}

/// Start the daemon: install the logger, build the Task Manager, and serve the XML-RPC
/// endpoint until `stop_server` is called.
pub async fn run(settings: Settings, init_logging: bool) -> Result<()> {
    if init_logging {
        init_logger(&settings)?;
    }

    let manager = TaskManager::new(&settings);
    let router = rpc::build_router(manager.clone());

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.host, settings.port))?;

    info!("batchqd listening on http://{addr}/RPC2 (max_cpus={})", settings.max_cpus);

    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move {
            manager.shutdown_requested().await;
            info!("Graceful shutdown initiated");
        })
        .await
        .context("RPC server terminated unexpectedly")?;

    Ok(())
}
