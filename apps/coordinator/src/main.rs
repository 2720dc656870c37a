//! panelcast coordinator entry point.

mod app;
mod config;
mod console;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,panelcast=debug")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting panelcast coordinator"
    );

    let config = config::Config::load()?;
    tracing::info!(
        control_port = config.control_port,
        slide_dir = %config.slide_dir.display(),
        spot_dir = %config.spot_dir.display(),
        "configuration loaded"
    );

    if !panelcast_discovery::wait_for_network(config.network_wait_attempts) {
        anyhow::bail!(
            "no network interface became available after {} attempts",
            config.network_wait_attempts
        );
    }

    // Discovery and the control channel share this thread; each file
    // service runs its own.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(app::run(config))?;

    tracing::info!("coordinator shut down cleanly");
    Ok(())
}
