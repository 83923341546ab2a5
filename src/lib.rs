pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod session;
pub mod settings;
pub mod tracking;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use pipeline::EncoderLauncher;
use server::TrackerServer;
use session::SessionRegistry;
use settings::Settings;
use utils::{init_logging, SystemClock};

pub async fn run() -> Result<()> {
    let config_path = Settings::config_path();
    let settings = Settings::load(&config_path)?.with_env_overrides();
    init_logging(settings.debug);

    log::info!("tracker-recorder starting up...");
    if config_path.exists() {
        log::info!("configuration ready: {}", config_path.display());
    } else {
        log::warn!("config {} not found, using defaults", config_path.display());
    }
    log::info!(
        "recording {:?} into {}",
        settings.allowed_classes,
        settings.recordings_dir.display()
    );

    let launcher = Arc::new(EncoderLauncher::new(
        settings.encoder_program.clone(),
        settings.encoder_framerate,
    ));
    let registry = Arc::new(SessionRegistry::new(
        settings.session_config(),
        launcher,
        Arc::new(SystemClock),
    ));
    let server = TrackerServer::bind(&settings.listen_addr, registry).await?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("interrupt received"),
            Err(err) => log::error!("failed to listen for ctrl-c: {err}"),
        }
        ctrl_c.cancel();
    });

    server.serve(shutdown).await
}
