//! WebSocket plumbing shared by the control channel and the file services.
//!
//! A [`NetServer`] accepts panel connections, performs the WebSocket
//! handshake and runs a read and a write pump per connection. Everything
//! that happens on a connection is reported as a [`NetEvent`] on a single
//! queue, so the owning service can keep its connection set in one task
//! without locks.

mod connection;
mod server;

pub use connection::{Connection, ConnectionId, SendError};
pub use server::{NetEvent, NetServer, ServerConfig};

/// Per-connection send queue capacity (frames, not bytes).
///
/// File services queue at most one chunk per request, panels request
/// chunks one at a time, so a small queue is enough.
pub const SEND_BUFFER_SIZE: usize = 64;

/// Capacity of the event queue feeding a service.
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Errors produced by the WebSocket server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
