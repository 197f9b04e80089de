//! meteosnap daemon binary.
//!
//! Starts the background poller and the HTTP server, wired together
//! through shared state. Ctrl+C shuts both down gracefully.

use argh::FromArgs;
use meteosnap::{
    run_http_server, run_poller, DaemonConfig, OpenMeteoClient, SharedState, SnapshotMirror,
    SnapshotStore,
};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(FromArgs)]
/// Weather snapshot daemon - polls Open-Meteo, archives CSV records and
/// serves the latest snapshot over HTTP.
struct Args {
    /// path to the configuration file (optional, uses defaults)
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// HTTP port override (default from config, 5000)
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let config = if let Some(config_path) = &args.config {
        match DaemonConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("failed to load config from '{}': {}", config_path, e);
                std::process::exit(1);
            }
        }
    } else {
        log::info!("no config file specified, using defaults");
        DaemonConfig::default()
    };
    let port = args.port.unwrap_or(config.http_port);

    log::info!(
        "polling ({:.2}, {:.2}) every {}s",
        config.location.latitude,
        config.location.longitude,
        config.interval_secs
    );

    let store = SnapshotStore::open(&config.storage.dir, &config.storage.file_prefix)?;
    log::info!("storage directory: {}", store.dir().display());

    let mirror = match &config.s3 {
        Some(s3) => SnapshotMirror::connect(s3).await,
        None => {
            log::info!("no S3 configuration, mirroring disabled");
            SnapshotMirror::disabled()
        }
    };

    let state = Arc::new(SharedState::new(config.interval_secs));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler({
        let shutdown_tx = shutdown_tx.clone();
        move || {
            log::info!("received Ctrl+C, shutting down gracefully...");
            shutdown_tx.send(()).ok();
        }
    })?;

    let fetcher = OpenMeteoClient::new(config.location.clone(), config.fetch.clone())?;
    let poller_task = tokio::spawn(run_poller(
        fetcher,
        store.clone(),
        mirror,
        state.clone(),
        shutdown_rx.clone(),
    ));

    run_http_server(state, Arc::new(store), port, shutdown_rx).await?;

    poller_task.await.ok();
    log::info!("meteosnap stopped");

    Ok(())
}
