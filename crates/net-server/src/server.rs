//! WebSocket accept loop.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use panelcast_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::ServerError;
use crate::connection::{self, Connection};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Service name used in log lines.
    pub name: String,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

/// Something that happened on one of the server's connections.
#[derive(Debug)]
pub enum NetEvent {
    /// Handshake finished. Always the first event for a connection.
    Connected(Connection),
    /// Text frame from the panel.
    Text { conn: Connection, text: String },
    /// Binary frame from the panel.
    Binary { conn: Connection, data: Vec<u8> },
    /// The panel went away. Not reported for connections closed locally.
    Disconnected { conn: Connection },
    /// Transport error. The connection is already closed.
    Error { conn: Connection, error: String },
}

/// A bound WebSocket listener.
pub struct NetServer {
    name: String,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl NetServer {
    /// Binds to `0.0.0.0:<port>`.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(service = %config.name, "listening on {local_addr}");

        Ok(Self {
            name: config.name.clone(),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `cancel` fires.
    ///
    /// Every connection gets a child of `cancel`, so cancelling the server
    /// also closes the connections it accepted.
    pub async fn run(self, events: mpsc::Sender<NetEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(service = %self.name, "server shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let events = events.clone();
                            let conn_cancel = cancel.child_token();
                            let name = self.name.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, events, conn_cancel).await {
                                    tracing::error!(service = %name, %peer_addr, "handshake failed: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(service = %self.name, "accept error: {e}");
                        }
                    }
                }
            }
        }
    }
}

/// Upgrades one TCP stream and hands it to the pumps.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    events: mpsc::Sender<NetEvent>,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let _ = stream.set_nodelay(true);

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
    let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;
    tracing::debug!(%peer_addr, "WebSocket connection established");

    connection::attach(ws_stream, peer_addr, events, cancel).await;
    Ok(())
}
