//! Application orchestrator: wires discovery, the control channel and the
//! two file services together.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use panelcast_control_server::{ControlError, ControlEvent, ControlHandle, ControlService};
use panelcast_discovery::{DiscoveryConfig, DiscoveryEvent, DiscoveryListener};
use panelcast_file_server::{FileServerConfig, FileServerEvent, FileServerHandle};
use panelcast_net_server::ServerConfig;

use crate::config::Config;
use crate::console::{self, OperatorCommand};

const CONTROL_SERVICE: &str = "PanelServer";
const SLIDE_SERVICE: &str = "SlideUpdater";
const SPOT_SERVICE: &str = "SpotUpdater";

/// Runs the coordinator until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // -- Discovery (fatal if no interface binds) --
    let discovery = DiscoveryListener::bind(&DiscoveryConfig {
        port: config.discovery_port,
        group: config.multicast_group,
    })
    .await?;
    tracing::info!(addresses = ?discovery.addresses(), "discovery ready");

    // -- Control channel (fatal if the port is taken) --
    let (control_tx, mut control_events) = mpsc::channel(256);
    let (control, panels) = ControlService::bind(
        &ServerConfig::new(CONTROL_SERVICE, config.control_port),
        control_tx,
    )
    .await?;

    // -- File services --
    let (files_tx, mut file_events) = mpsc::channel(8);
    let slides = start_file_service(
        SLIDE_SERVICE,
        config.slide_port,
        &config.slide_dir,
        &config.slide_filters,
        &files_tx,
    )
    .await;
    let spots = start_file_service(
        SPOT_SERVICE,
        config.spot_port,
        &config.spot_dir,
        &config.spot_filters,
        &files_tx,
    )
    .await;

    let (discovery_tx, mut discovery_events) = mpsc::channel(64);
    let discovery_task = tokio::spawn(discovery.run(discovery_tx, cancel.child_token()));
    let control_task = tokio::spawn(control.run(cancel.child_token()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    tracing::info!("coordinator ready, type `help` for commands");

    // -- Main loop --
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }

            Some(DiscoveryEvent::ServerRequested { peer }) = discovery_events.recv() => {
                if let Err(e) = panels.evict_peer(peer).await {
                    tracing::error!("cannot evict {peer}: {e}");
                }
            }

            Some(event) = control_events.recv() => log_control_event(&event),

            Some(FileServerEvent::Stopped { service, with_errors }) = file_events.recv() => {
                if with_errors {
                    tracing::warn!(%service, "file service stopped with errors");
                } else {
                    tracing::info!(%service, "file service stopped without errors");
                }
            }

            line = lines.next_line(), if console_open => match line {
                Ok(Some(line)) => {
                    if line.trim() == "help" {
                        println!("{}", console::HELP);
                        continue;
                    }
                    match console::parse(&line) {
                        Some(OperatorCommand::Quit) => break,
                        Some(OperatorCommand::Reload) => {
                            reload(slides.as_ref(), &config.slide_dir, &config.slide_filters).await;
                            reload(spots.as_ref(), &config.spot_dir, &config.spot_filters).await;
                        }
                        Some(command) => {
                            if let Err(e) = execute(&panels, command).await {
                                tracing::warn!("{e}");
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => println!("unknown command, type `help`"),
                    }
                }
                Ok(None) => console_open = false,
                Err(e) => {
                    tracing::warn!("console read error: {e}");
                    console_open = false;
                }
            },
        }
    }

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    cancel.cancel();
    let _ = control_task.await;
    let _ = discovery_task.await;

    let closing = [slides, spots].into_iter().flatten().map(FileServerHandle::close);
    for close in closing {
        close.await;
    }
    while let Ok(FileServerEvent::Stopped { service, with_errors }) = file_events.try_recv() {
        tracing::info!(%service, with_errors, "file service done");
    }

    Ok(())
}

async fn start_file_service(
    name: &str,
    port: u16,
    directory: &std::path::Path,
    filters: &str,
    events: &mpsc::Sender<FileServerEvent>,
) -> Option<FileServerHandle> {
    let config = FileServerConfig {
        name: name.to_string(),
        port,
        directory: directory.to_path_buf(),
        filters: filters.to_string(),
    };
    match FileServerHandle::spawn(config, events.clone()).await {
        Ok(handle) => {
            tracing::info!(service = name, addr = %handle.local_addr(), "file service listening");
            Some(handle)
        }
        Err(e) => {
            tracing::error!(service = name, "file service failed to start: {e}");
            None
        }
    }
}

async fn reload(service: Option<&FileServerHandle>, directory: &std::path::Path, filters: &str) {
    let Some(service) = service else {
        return;
    };
    match service.set_directory(directory, filters).await {
        Ok(count) => tracing::info!(service = service.name(), count, "media directory rescanned"),
        Err(e) => tracing::warn!(service = service.name(), "rescan failed: {e}"),
    }
}

async fn execute(panels: &ControlHandle, command: OperatorCommand) -> Result<(), ControlError> {
    match command {
        OperatorCommand::ToggleSpots => {
            panels.toggle_spot_loop().await?;
        }
        OperatorCommand::ToggleSlides => {
            panels.toggle_slide_show().await?;
        }
        OperatorCommand::ToggleCamera => {
            panels.toggle_live_camera().await?;
        }
        OperatorCommand::StartCamera(panel) => {
            panels.start_camera(panel).await?;
        }
        OperatorCommand::StopCamera => {
            panels.stop_camera().await?;
        }
        OperatorCommand::Panels => {
            let list = panels.panels().await?;
            if list.is_empty() {
                println!("no panels connected");
            }
            for peer in list {
                println!("{peer}");
            }
        }
        OperatorCommand::Status => {
            let (mode, enablement) = panels.state().await?;
            println!("{mode:?} {enablement:?}");
        }
        OperatorCommand::GetOrientation(panel) => panels.get_orientation(panel).await?,
        OperatorCommand::SetOrientation(panel, direction) => {
            panels.set_orientation(panel, direction).await?
        }
        OperatorCommand::GetScoreOnly(panel) => panels.get_score_only(panel).await?,
        OperatorCommand::SetScoreOnly(panel, flag) => panels.set_score_only(panel, flag).await?,
        OperatorCommand::Pan(panel, value) => panels.pan(panel, value).await?,
        OperatorCommand::Tilt(panel, value) => panels.tilt(panel, value).await?,
        OperatorCommand::GetPanTilt(panel) => panels.get_pan_tilt(panel).await?,
        OperatorCommand::ShutdownPanels => panels.shutdown_panels().await?,
        // Handled by the main loop.
        OperatorCommand::Reload | OperatorCommand::Quit => {}
    }
    Ok(())
}

fn log_control_event(event: &ControlEvent) {
    match event {
        ControlEvent::EnablementChanged(enablement) => {
            tracing::info!(?enablement, "operator controls changed");
        }
        ControlEvent::ModeChanged(mode) => tracing::info!(?mode, "display mode"),
        ControlEvent::PanTilt { panel, pan, tilt } => {
            tracing::info!(%panel, pan, tilt, "panel camera position");
        }
        ControlEvent::Orientation { panel, direction } => {
            tracing::info!(%panel, ?direction, "panel orientation");
        }
        ControlEvent::ScoreOnly { panel, score_only } => {
            tracing::info!(%panel, score_only, "panel score-only mode");
        }
    }
}
