//! File service thread, actor and handle.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use panelcast_catalog::Catalog;
use panelcast_net_server::{Connection, EVENT_BUFFER_SIZE, NetEvent, NetServer, ServerConfig};

use crate::admission::{Admission, admit};
use crate::request::{self, Response};
use crate::{FileServerError, REQUEST_BUFFER_SIZE, SHUTDOWN_GRACE};

/// Startup settings for one file service.
#[derive(Debug, Clone)]
pub struct FileServerConfig {
    /// Service name used in logs and events (e.g. `SlideUpdater`).
    pub name: String,
    /// TCP port (0 = OS-assigned).
    pub port: u16,
    pub directory: PathBuf,
    /// Space-separated glob filters.
    pub filters: String,
}

/// Reported to the coordinator when a file service thread ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileServerEvent {
    Stopped { service: String, with_errors: bool },
}

enum Request {
    SetDirectory {
        directory: PathBuf,
        filters: String,
        reply: oneshot::Sender<usize>,
    },
    /// Blocks the service thread, standing in for a stuck read.
    #[cfg(test)]
    Stall(std::time::Duration),
}

/// Owner-side handle to a file service thread.
pub struct FileServerHandle {
    name: String,
    local_addr: SocketAddr,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
    force: CancellationToken,
    finished: oneshot::Receiver<()>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl FileServerHandle {
    /// Starts the service on a new thread and waits until it is listening.
    ///
    /// If the port cannot be bound the thread still reports
    /// `Stopped { with_errors: true }` on `events`.
    pub async fn spawn(
        config: FileServerConfig,
        events: mpsc::Sender<FileServerEvent>,
    ) -> Result<Self, FileServerError> {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER_SIZE);
        let (bound_tx, bound_rx) = oneshot::channel();
        let (finished_tx, finished) = oneshot::channel();
        let cancel = CancellationToken::new();
        let force = CancellationToken::new();

        let name = config.name.clone();
        let thread = std::thread::Builder::new()
            .name(format!("panelcast-{}", name.to_lowercase()))
            .spawn({
                let name = name.clone();
                let cancel = cancel.clone();
                let force = force.clone();
                move || {
                    let with_errors =
                        service_thread(config, requests_rx, bound_tx, cancel, force);
                    let _ = events.try_send(FileServerEvent::Stopped {
                        service: name,
                        with_errors,
                    });
                    let _ = finished_tx.send(());
                }
            })?;

        let local_addr = bound_rx
            .await
            .map_err(|_| FileServerError::Stopped)?
            .map_err(FileServerError::Server)?;

        Ok(Self {
            name,
            local_addr,
            requests: requests_tx,
            cancel,
            force,
            finished,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Re-snapshots the catalog. Returns the number of files found.
    pub async fn set_directory(
        &self,
        directory: impl Into<PathBuf>,
        filters: impl Into<String>,
    ) -> Result<usize, FileServerError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::SetDirectory {
                directory: directory.into(),
                filters: filters.into(),
                reply,
            })
            .await
            .map_err(|_| FileServerError::Stopped)?;
        rx.await.map_err(|_| FileServerError::Stopped)
    }

    /// Closes every connection and stops the thread, forcing it down after
    /// [`SHUTDOWN_GRACE`].
    pub async fn close(mut self) {
        self.cancel.cancel();

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.finished).await {
            Ok(_) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                tracing::info!(service = %self.name, "file service closed");
            }
            Err(_) => {
                self.force.cancel();
                // Detached: the thread drops its runtime in the background.
                self.thread.take();
                tracing::warn!(service = %self.name, "file service did not stop in time, forced close");
            }
        }
    }
}

impl Drop for FileServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Thread body. Returns `true` if the service ended with errors.
fn service_thread(
    config: FileServerConfig,
    requests: mpsc::Receiver<Request>,
    bound: oneshot::Sender<Result<SocketAddr, panelcast_net_server::ServerError>>,
    cancel: CancellationToken,
    force: CancellationToken,
) -> bool {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(service = %config.name, "cannot start runtime: {e}");
            let _ = bound.send(Err(e.into()));
            return true;
        }
    };

    let name = config.name.clone();
    let forced = runtime.block_on(async move {
        let server = match NetServer::bind(&ServerConfig::new(&config.name, config.port)).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(service = %config.name, port = config.port, "cannot listen: {e}");
                let _ = bound.send(Err(e));
                return None;
            }
        };
        let _ = bound.send(Ok(server.local_addr()));

        let service = FileService::new(config);
        tokio::select! {
            biased;
            _ = force.cancelled() => Some(true),
            _ = service.run(server, requests, cancel) => Some(false),
        }
    });

    match forced {
        // In-flight tasks are dropped without waiting for them.
        Some(true) => {
            runtime.shutdown_background();
            tracing::warn!(service = %name, "file service aborted");
            true
        }
        Some(false) => false,
        None => true,
    }
}

/// Actor owning one service's connection set and catalog.
struct FileService {
    name: String,
    catalog: Catalog,
    connections: HashMap<IpAddr, Connection>,
}

impl FileService {
    fn new(config: FileServerConfig) -> Self {
        let mut catalog = Catalog::new();
        let count = catalog.set_directory(&config.directory, &config.filters);
        tracing::info!(service = %config.name, dir = %catalog.directory(), count, "catalog loaded");

        Self {
            name: config.name,
            catalog,
            connections: HashMap::new(),
        }
    }

    async fn run(
        mut self,
        server: NetServer,
        mut requests: mpsc::Receiver<Request>,
        cancel: CancellationToken,
    ) {
        let (net_tx, mut net_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let accept = tokio::spawn(server.run(net_tx, cancel.child_token()));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(event) = net_rx.recv() => self.on_net_event(event),

                Some(request) = requests.recv() => self.on_request(request),
            }
        }

        for (_, conn) in self.connections.drain() {
            conn.close();
        }
        let _ = accept.await;
        tracing::info!(service = %self.name, "file service stopped");
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::SetDirectory {
                directory,
                filters,
                reply,
            } => {
                let count = self.catalog.set_directory(&directory, &filters);
                tracing::info!(service = %self.name, dir = %self.catalog.directory(), count, "catalog reloaded");
                let _ = reply.send(count);
            }
            #[cfg(test)]
            Request::Stall(duration) => std::thread::sleep(duration),
        }
    }

    fn on_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected(conn) => self.admit(conn),
            NetEvent::Text { conn, text } => {
                if !self.is_current(&conn) {
                    tracing::debug!(service = %self.name, peer = %conn.peer_addr(), "request from replaced connection ignored");
                    return;
                }
                for response in request::handle(&self.catalog, &text) {
                    self.respond(&conn, response);
                }
            }
            NetEvent::Binary { conn, data } => {
                tracing::warn!(service = %self.name, peer = %conn.peer_addr(), len = data.len(), "unexpected binary message");
            }
            NetEvent::Disconnected { conn } => {
                tracing::info!(service = %self.name, peer = %conn.peer_addr(), "panel disconnected");
                self.remove(&conn);
            }
            NetEvent::Error { conn, error } => {
                tracing::warn!(service = %self.name, peer = %conn.peer_addr(), "socket error: {error}");
                conn.abort();
                self.remove(&conn);
            }
        }
    }

    fn admit(&mut self, conn: Connection) {
        let ip = conn.ip();
        let Some(existing) = self.connections.get(&ip) else {
            tracing::info!(service = %self.name, peer = %conn.peer_addr(), "panel connected");
            self.connections.insert(ip, conn);
            return;
        };

        match admit(existing.is_valid(), conn.is_valid()) {
            Admission::ReplaceExisting => {
                tracing::info!(service = %self.name, peer = %conn.peer_addr(), "replacing panel connection");
                existing.close();
                self.connections.insert(ip, conn);
            }
            Admission::RejectNew => {
                tracing::info!(service = %self.name, peer = %conn.peer_addr(), "rejecting duplicate connection");
                conn.close();
            }
            Admission::DropBoth => {
                tracing::info!(service = %self.name, peer = %conn.peer_addr(), "dropping both stale connections");
                existing.close();
                self.connections.remove(&ip);
                conn.close();
            }
        }
    }

    fn is_current(&self, conn: &Connection) -> bool {
        self.connections
            .get(&conn.ip())
            .is_some_and(|c| c.id() == conn.id())
    }

    fn remove(&mut self, conn: &Connection) {
        if self.is_current(conn) {
            self.connections.remove(&conn.ip());
        } else {
            tracing::debug!(service = %self.name, peer = %conn.peer_addr(), "removal of unknown connection");
        }
    }

    fn respond(&self, conn: &Connection, response: Response) {
        if !conn.is_valid() {
            tracing::warn!(service = %self.name, peer = %conn.peer_addr(), "connection gone, reply abandoned");
            return;
        }

        let (expected, written) = match response {
            Response::Text(text) => (text.len(), conn.send_text(&text).unwrap_or(0)),
            Response::Binary(data) => (data.len(), conn.send_binary(data).unwrap_or(0)),
        };
        if written != expected {
            tracing::warn!(service = %self.name, peer = %conn.peer_addr(), written, expected, "short write");
        }
    }
}
