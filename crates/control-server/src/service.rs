//! Control service actor.

use std::net::{IpAddr, SocketAddr};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use panelcast_net_server::{Connection, EVENT_BUFFER_SIZE, NetEvent, NetServer, ServerConfig};
use panelcast_protocol::control::parse_reports;
use panelcast_protocol::{Command, PanelDirection, PanelReport};

use crate::mode::{Enablement, Mode, Toggle, Transition};
use crate::registry::Registry;
use crate::{COMMAND_BUFFER_SIZE, ControlError};

/// What the operator side gets told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    EnablementChanged(Enablement),
    ModeChanged(Mode),
    PanTilt { panel: IpAddr, pan: i32, tilt: i32 },
    Orientation { panel: IpAddr, direction: PanelDirection },
    ScoreOnly { panel: IpAddr, score_only: bool },
}

type Reply<T> = oneshot::Sender<Result<T, ControlError>>;

enum Request {
    Toggle { toggle: Toggle, reply: Reply<Mode> },
    StartCamera { panel: IpAddr, reply: Reply<Mode> },
    StopCamera { reply: Reply<Mode> },
    Panel { panel: IpAddr, command: Command, reply: Reply<()> },
    Shutdown { reply: Reply<()> },
    EvictPeer(IpAddr),
    Panels(oneshot::Sender<Vec<SocketAddr>>),
    State(oneshot::Sender<(Mode, Enablement)>),
}

/// Operator-side handle to a running [`ControlService`].
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Request>,
}

impl ControlHandle {
    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ControlError::Stopped)?;
        rx.await.map_err(|_| ControlError::Stopped)?
    }

    /// Starts or stops a mode. Returns the resulting mode.
    pub async fn toggle(&self, toggle: Toggle) -> Result<Mode, ControlError> {
        self.call(|reply| Request::Toggle { toggle, reply }).await
    }

    pub async fn toggle_spot_loop(&self) -> Result<Mode, ControlError> {
        self.toggle(Toggle::SpotLoop).await
    }

    pub async fn toggle_slide_show(&self) -> Result<Mode, ControlError> {
        self.toggle(Toggle::SlideShow).await
    }

    pub async fn toggle_live_camera(&self) -> Result<Mode, ControlError> {
        self.toggle(Toggle::LiveCamera).await
    }

    /// Puts one panel on the live camera and asks for its pan/tilt.
    pub async fn start_camera(&self, panel: IpAddr) -> Result<Mode, ControlError> {
        self.call(|reply| Request::StartCamera { panel, reply }).await
    }

    /// Ends the live camera on every panel.
    pub async fn stop_camera(&self) -> Result<Mode, ControlError> {
        self.call(|reply| Request::StopCamera { reply }).await
    }

    /// Tells every panel to power down.
    pub async fn shutdown_panels(&self) -> Result<(), ControlError> {
        self.call(|reply| Request::Shutdown { reply }).await
    }

    pub async fn get_orientation(&self, panel: IpAddr) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::GetOrientation).await
    }

    pub async fn set_orientation(
        &self,
        panel: IpAddr,
        direction: PanelDirection,
    ) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::SetOrientation(direction))
            .await
    }

    pub async fn get_score_only(&self, panel: IpAddr) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::GetScoreOnly).await
    }

    pub async fn set_score_only(&self, panel: IpAddr, score_only: bool) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::SetScoreOnly(score_only))
            .await
    }

    pub async fn pan(&self, panel: IpAddr, value: i32) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::Pan(value)).await
    }

    pub async fn tilt(&self, panel: IpAddr, value: i32) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::Tilt(value)).await
    }

    pub async fn get_pan_tilt(&self, panel: IpAddr) -> Result<(), ControlError> {
        self.send_to_panel(panel, Command::GetPanTilt).await
    }

    async fn send_to_panel(&self, panel: IpAddr, command: Command) -> Result<(), ControlError> {
        self.call(|reply| Request::Panel {
            panel,
            command,
            reply,
        })
        .await
    }

    /// Drops any control connection held for `panel`. Sent when the panel
    /// asks to discover the coordinator again.
    pub async fn evict_peer(&self, panel: IpAddr) -> Result<(), ControlError> {
        self.tx
            .send(Request::EvictPeer(panel))
            .await
            .map_err(|_| ControlError::Stopped)
    }

    /// Connected panels in address order.
    pub async fn panels(&self) -> Result<Vec<SocketAddr>, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Panels(reply))
            .await
            .map_err(|_| ControlError::Stopped)?;
        rx.await.map_err(|_| ControlError::Stopped)
    }

    /// Current mode and control enablement.
    pub async fn state(&self) -> Result<(Mode, Enablement), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::State(reply))
            .await
            .map_err(|_| ControlError::Stopped)?;
        rx.await.map_err(|_| ControlError::Stopped)
    }
}

/// Control channel service: accept loop plus the actor that owns the
/// registry and the mode.
pub struct ControlService {
    server: NetServer,
    requests: mpsc::Receiver<Request>,
    state: ControlState,
}

impl ControlService {
    /// Binds the control port. The service does nothing until [`run`](Self::run).
    pub async fn bind(
        config: &ServerConfig,
        events: mpsc::Sender<ControlEvent>,
    ) -> Result<(Self, ControlHandle), ControlError> {
        let server = NetServer::bind(config).await?;
        let (tx, requests) = mpsc::channel(COMMAND_BUFFER_SIZE);

        let service = Self {
            server,
            requests,
            state: ControlState::new(events),
        };
        Ok((service, ControlHandle { tx }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Runs until `cancel` fires, then closes every panel connection.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            server,
            mut requests,
            mut state,
        } = self;

        let (net_tx, mut net_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let accept = tokio::spawn(server.run(net_tx, cancel.child_token()));

        state.emit(ControlEvent::EnablementChanged(state.enablement));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(event) = net_rx.recv() => state.on_net_event(event),

                Some(request) = requests.recv() => state.on_request(request),
            }
        }

        state.registry.close_all();
        let _ = accept.await;
        tracing::info!(service = "PanelServer", "control service stopped");
    }
}

struct ControlState {
    registry: Registry,
    mode: Mode,
    enablement: Enablement,
    events: mpsc::Sender<ControlEvent>,
}

impl ControlState {
    fn new(events: mpsc::Sender<ControlEvent>) -> Self {
        let mode = Mode::default();
        Self {
            registry: Registry::new(),
            mode,
            enablement: Enablement::compute(mode, 0),
            events,
        }
    }

    fn emit(&self, event: ControlEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::debug!("control event dropped: {e}");
        }
    }

    fn on_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected(conn) => {
                tracing::info!(peer = %conn.peer_addr(), "panel connected");
                self.registry.register(conn);
                self.refresh();
            }
            NetEvent::Text { conn, text } => {
                if !self.registry.is_current(&conn) {
                    tracing::debug!(peer = %conn.peer_addr(), "frame from replaced connection ignored");
                    return;
                }
                self.on_text(&conn, &text);
            }
            NetEvent::Binary { conn, data } => {
                tracing::warn!(peer = %conn.peer_addr(), len = data.len(), "unexpected binary message on control channel");
            }
            NetEvent::Disconnected { conn } => {
                tracing::info!(peer = %conn.peer_addr(), "panel disconnected");
                self.registry.remove(conn.ip(), conn.id());
                self.refresh();
            }
            NetEvent::Error { conn, error } => {
                tracing::warn!(peer = %conn.peer_addr(), "panel socket error: {error}");
                conn.abort();
                self.registry.remove(conn.ip(), conn.id());
                self.refresh();
            }
        }
    }

    fn on_text(&mut self, conn: &Connection, text: &str) {
        let panel = conn.ip();
        for report in parse_reports(text) {
            match report {
                Ok(PanelReport::StatusRequest) => {
                    let status = self.mode.status_message();
                    self.send_to_one(conn, &status);
                }
                Ok(PanelReport::PanTilt { pan, tilt }) => {
                    self.emit(ControlEvent::PanTilt { panel, pan, tilt });
                }
                Ok(PanelReport::Orientation(direction)) => {
                    self.emit(ControlEvent::Orientation { panel, direction });
                }
                Ok(PanelReport::ScoreOnly(score_only)) => {
                    self.emit(ControlEvent::ScoreOnly { panel, score_only });
                }
                Err(e) => tracing::warn!(%panel, "malformed panel report: {e}"),
            }
        }
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Toggle { toggle, reply } => {
                let _ = reply.send(self.toggle(toggle));
            }
            Request::StartCamera { panel, reply } => {
                let _ = reply.send(self.start_camera(panel));
            }
            Request::StopCamera { reply } => {
                let _ = reply.send(self.stop_camera());
            }
            Request::Panel {
                panel,
                command,
                reply,
            } => {
                let result = match self.registry.get(panel).cloned() {
                    Some(conn) => {
                        self.send_to_one(&conn, &command.encode());
                        Ok(())
                    }
                    None => Err(ControlError::UnknownPanel(panel)),
                };
                let _ = reply.send(result);
            }
            Request::Shutdown { reply } => {
                let result = if self.registry.is_empty() {
                    Err(ControlError::NoPanels)
                } else {
                    tracing::info!("shutting down all panels");
                    self.send_to_all(&Command::Kill.encode());
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Request::EvictPeer(panel) => {
                if self.registry.evict(panel).is_some() {
                    tracing::info!(%panel, "evicted stale panel connection");
                } else {
                    tracing::debug!(%panel, "no connection to evict");
                }
                self.refresh();
            }
            Request::Panels(reply) => {
                let panels = self.registry.connections().map(Connection::peer_addr).collect();
                let _ = reply.send(panels);
            }
            Request::State(reply) => {
                let _ = reply.send((self.mode, self.enablement));
            }
        }
    }

    fn toggle(&mut self, toggle: Toggle) -> Result<Mode, ControlError> {
        if self.registry.is_empty() {
            self.refresh();
            return Err(ControlError::NoPanels);
        }

        match self.mode.toggle(toggle) {
            Transition::Start { mode, command } => {
                self.send_to_all(&command.encode());
                // Every panel may have turned out to be gone.
                if self.registry.is_empty() {
                    return Err(ControlError::NoPanels);
                }
                self.set_mode(mode);
            }
            Transition::Stop { command } => {
                self.send_to_all(&command.encode());
                self.set_mode(Mode::ShowPanel);
            }
            Transition::Refused => return Err(ControlError::Busy(self.mode)),
        }

        self.refresh();
        Ok(self.mode)
    }

    fn start_camera(&mut self, panel: IpAddr) -> Result<Mode, ControlError> {
        if !matches!(self.mode, Mode::ShowPanel | Mode::ShowCamera) {
            return Err(ControlError::Busy(self.mode));
        }
        let conn = self
            .registry
            .get(panel)
            .cloned()
            .ok_or(ControlError::UnknownPanel(panel))?;

        self.send_to_one(&conn, &Command::Live.encode());
        if !self.registry.is_current(&conn) {
            return Err(ControlError::UnknownPanel(panel));
        }
        self.send_to_one(&conn, &Command::GetPanTilt.encode());
        self.set_mode(Mode::ShowCamera);
        self.refresh();
        Ok(self.mode)
    }

    fn stop_camera(&mut self) -> Result<Mode, ControlError> {
        if self.registry.is_empty() {
            self.refresh();
            return Err(ControlError::NoPanels);
        }
        if !matches!(self.mode, Mode::ShowPanel | Mode::ShowCamera) {
            return Err(ControlError::Busy(self.mode));
        }
        self.send_to_all(&Command::EndLive.encode());
        self.set_mode(Mode::ShowPanel);
        self.refresh();
        Ok(self.mode)
    }

    fn send_to_one(&mut self, conn: &Connection, message: &str) {
        if !conn.is_valid() {
            tracing::warn!(peer = %conn.peer_addr(), "panel socket is invalid");
            if self.registry.remove(conn.ip(), conn.id()) {
                conn.close();
            }
            self.refresh();
            return;
        }

        let written = conn.send_text(message).unwrap_or(0);
        if written != message.len() {
            tracing::warn!(peer = %conn.peer_addr(), written, expected = message.len(), "error writing {message}");
        } else {
            tracing::trace!(peer = %conn.peer_addr(), "sent {message}");
        }
    }

    fn send_to_all(&mut self, message: &str) {
        tracing::debug!("broadcast {message}");
        let targets: Vec<Connection> = self.registry.connections().cloned().collect();
        for conn in &targets {
            self.send_to_one(conn, message);
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            tracing::info!(from = ?self.mode, to = ?mode, "mode changed");
            self.mode = mode;
            self.emit(ControlEvent::ModeChanged(mode));
        }
    }

    /// Re-derives enablement from the registry. An empty registry always
    /// returns the panels to the score.
    fn refresh(&mut self) {
        if self.registry.is_empty() {
            self.set_mode(Mode::ShowPanel);
        }
        let enablement = Enablement::compute(self.mode, self.registry.len());
        if enablement != self.enablement {
            self.enablement = enablement;
            self.emit(ControlEvent::EnablementChanged(enablement));
        }
    }
}
