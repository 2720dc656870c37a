//! Panel connection handle and its read/write pumps.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use panelcast_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::SEND_BUFFER_SIZE;
use crate::server::NetEvent;

/// Identifies one accepted connection for its whole lifetime.
///
/// Two connections from the same peer address always have different ids.
pub type ConnectionId = Uuid;

/// Handle to an accepted panel connection.
///
/// Cloneable and cheap: wraps the write pump's queue and the shutdown
/// token. All clones refer to the same underlying socket.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    tx: mpsc::Sender<WsMessage>,
    cancel: CancellationToken,
    aborted: Arc<AtomicBool>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Error returned when a frame cannot be queued.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

impl Connection {
    /// Creates a connection whose outgoing frames land in the returned
    /// receiver. [`NetServer`](crate::NetServer) feeds that receiver to a
    /// write pump; tests read it directly.
    pub fn channel(peer: SocketAddr) -> (Self, mpsc::Receiver<WsMessage>) {
        Self::channel_with_token(peer, CancellationToken::new())
    }

    fn channel_with_token(
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(SEND_BUFFER_SIZE);
        let conn = Self {
            id: Uuid::new_v4(),
            peer,
            tx,
            cancel,
            aborted: Arc::new(AtomicBool::new(false)),
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Peer IP address: the key connection sets are indexed by.
    pub fn ip(&self) -> IpAddr {
        self.peer.ip()
    }

    /// `true` while the connection has not been closed or aborted and its
    /// write pump is still draining the queue.
    pub fn is_valid(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }

    /// Queues a text frame. Returns the number of bytes queued.
    pub fn send_text(&self, text: &str) -> Result<usize, SendError> {
        self.tx
            .try_send(WsMessage::Text(text.to_owned().into()))
            .map(|()| text.len())
            .map_err(|_| SendError)
    }

    /// Queues a binary frame. Returns the number of bytes queued.
    pub fn send_binary(&self, data: Vec<u8>) -> Result<usize, SendError> {
        let len = data.len();
        self.tx
            .try_send(WsMessage::Binary(data.into()))
            .map(|()| len)
            .map_err(|_| SendError)
    }

    /// Closes the connection with a close handshake. No further events are
    /// reported for it.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Drops the connection without a close handshake. No further events
    /// are reported for it.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Why the read pump stopped.
enum ReadExit {
    /// Closed locally; the owner already knows.
    Cancelled,
    /// The panel closed the socket or stopped answering pings.
    Closed,
    /// Transport error.
    Failed(String),
}

/// Registers a freshly upgraded stream: reports `Connected` first, then
/// starts the pumps so no frame can be reported before its connection.
pub(crate) async fn attach<S>(
    ws_stream: S,
    peer: SocketAddr,
    events: mpsc::Sender<NetEvent>,
    cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
{
    let (conn, rx) = Connection::channel_with_token(peer, cancel);

    if events.send(NetEvent::Connected(conn.clone())).await.is_err() {
        tracing::debug!(%peer, "service gone, dropping new connection");
        return;
    }

    let (ws_sink, ws_stream) = ws_stream.split();

    tokio::spawn(write_pump(ws_sink, rx, conn.clone()));

    tokio::spawn(async move {
        let exit = read_pump(ws_stream, &conn, &events).await;
        // When the read pump exits, stop the write pump too.
        let event = match exit {
            ReadExit::Cancelled => None,
            ReadExit::Closed => Some(NetEvent::Disconnected { conn: conn.clone() }),
            ReadExit::Failed(error) => Some(NetEvent::Error {
                conn: conn.clone(),
                error,
            }),
        };
        conn.close();
        if let Some(event) = event {
            let _ = events.send(event).await;
        }
    });
}

/// Write pump: drains the send queue and pings the panel.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<WsMessage>, conn: Connection)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = conn.cancel.cancelled() => break,

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!(peer = %conn.peer, "write pump send error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!(peer = %conn.peer, "write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Closing the queue makes `is_valid` false for every clone.
    rx.close();

    if conn.is_aborted() {
        return;
    }

    // Frames queued before close() still go out, then a best-effort close frame.
    while let Ok(ws_msg) = rx.try_recv() {
        if sink.send(ws_msg).await.is_err() {
            return;
        }
    }
    let _ = sink.close().await;
}

/// Read pump: forwards panel frames as events until the socket ends.
async fn read_pump<S>(mut stream: S, conn: &Connection, events: &mpsc::Sender<NetEvent>) -> ReadExit
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
{
    let mut deadline = tokio::time::interval(WS_PONG_WAIT);
    deadline.reset();
    let mut heard_from_peer = true;

    loop {
        tokio::select! {
            _ = conn.cancel.cancelled() => return ReadExit::Cancelled,

            _ = deadline.tick() => {
                if !heard_from_peer {
                    tracing::warn!(peer = %conn.peer, "pong timeout, closing connection");
                    return ReadExit::Closed;
                }
                heard_from_peer = false;
            }

            frame = stream.next() => {
                let event = match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if text.len() > WS_MAX_MESSAGE_SIZE {
                            tracing::error!("message exceeds max size ({} > {})", text.len(), WS_MAX_MESSAGE_SIZE);
                            continue;
                        }
                        NetEvent::Text { conn: conn.clone(), text: text.as_str().to_owned() }
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        NetEvent::Binary { conn: conn.clone(), data: data.to_vec() }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        heard_from_peer = true;
                        deadline.reset();
                        continue;
                    }
                    // tungstenite answers pings on its own.
                    Some(Ok(WsMessage::Ping(_))) => {
                        heard_from_peer = true;
                        continue;
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        tracing::debug!(peer = %conn.peer, "received close frame");
                        return ReadExit::Closed;
                    }
                    Some(Ok(WsMessage::Frame(_))) => continue,
                    Some(Err(e)) => return ReadExit::Failed(e.to_string()),
                    None => return ReadExit::Closed,
                };

                heard_from_peer = true;
                // Events are dropped once the owner has closed us.
                if conn.cancel.is_cancelled() {
                    return ReadExit::Cancelled;
                }
                if events.send(event).await.is_err() {
                    return ReadExit::Cancelled;
                }
            }
        }
    }
}
