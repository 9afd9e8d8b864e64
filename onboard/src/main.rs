use crate::{
    arguments::Arguments,
    camera::{Camera, CameraDriver, ChdkptpLauncher, DisabledCamera},
    config::Config,
    session::Session,
};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::{runtime::Handle, sync::Mutex};

mod arguments;
mod camera;
mod config;
mod dispatcher;
mod heartbeat;
mod inbound;
mod outbound;
mod session;
mod telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.mavlink.port = port;
    }

    if !config.camera.enabled {
        tracing::warn!("Camera disabled, capture triggers will fail");
        return run(config, DisabledCamera).await;
    }

    let mut driver = CameraDriver::new(
        ChdkptpLauncher::new(&config.camera.chdkptp_root),
        config.camera_settings(),
    );
    driver
        .init_with_retries(config.camera.init_attempts)
        .await
        .context("Camera is not available")?;
    if let Some(zoom) = config.camera.zoom {
        driver.set_zoom(zoom).await?;
        let reported = driver.get_zoom().await?;
        tracing::info!("Camera zoom set to {zoom}, camera reports {reported}");
    }
    run(config, driver).await
}

async fn run<C: Camera + 'static>(config: Config, camera: C) -> anyhow::Result<()> {
    let camera = Arc::new(Mutex::new(camera));
    let mut session = Session::new(
        config.identity(),
        config.endpoint(),
        config.session_settings(),
        camera.clone(),
        Handle::current(),
    );
    session.start().await?;

    let lost_camera = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            false
        }
        () = session.failed() => true,
    };
    tracing::info!(
        "Shutting down {session} ({:?}), link {:?}, peer {:?}",
        session.state(),
        session.link_status(),
        session.peer()
    );

    session.stop().await;
    camera.lock().await.close().await?;
    if lost_camera {
        anyhow::bail!("Camera could not be recovered");
    }
    Ok(())
}
