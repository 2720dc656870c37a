//! Per-interface multicast sockets and the `getServer` responder.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use panelcast_protocol::constants::{DISCOVERY_PORT, MULTICAST_GROUP};
use panelcast_protocol::discovery::{encode_server_reply, is_server_request};

use crate::DiscoveryError;
use crate::interfaces::{MulticastInterface, local_ipv4_interfaces};

/// Largest datagram read in one call.
const DATAGRAM_BUF_SIZE: usize = 64 * 1024;

/// Multicast group and port the listener answers on.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub group: Ipv4Addr,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DISCOVERY_PORT,
            group: MULTICAST_GROUP,
        }
    }
}

/// Reported after a `getServer` request has been answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A panel at `peer` asked for the coordinator; any control connection
    /// it still holds is stale.
    ServerRequested { peer: IpAddr },
}

struct BoundSocket {
    name: String,
    socket: UdpSocket,
}

/// The set of sockets answering discovery requests.
pub struct DiscoveryListener {
    sockets: Vec<BoundSocket>,
    addresses: Vec<Ipv4Addr>,
}

impl DiscoveryListener {
    /// Binds one socket per local interface.
    ///
    /// Interfaces that fail to bind or join the group are logged and
    /// skipped. Fails only if none succeed.
    pub async fn bind(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Self::bind_interfaces(config, &local_ipv4_interfaces())
    }

    /// Binds the given interfaces. Must run inside a tokio runtime.
    pub fn bind_interfaces(
        config: &DiscoveryConfig,
        interfaces: &[MulticastInterface],
    ) -> Result<Self, DiscoveryError> {
        let mut bound = Vec::new();
        for iface in interfaces {
            match bind_multicast(config, iface.addr).and_then(UdpSocket::from_std) {
                Ok(socket) => {
                    tracing::info!(interface = %iface.name, addr = %iface.addr, port = config.port, group = %config.group, "discovery socket bound");
                    bound.push((iface.name.clone(), iface.addr, socket));
                }
                Err(e) => {
                    tracing::warn!(interface = %iface.name, addr = %iface.addr, "skipping interface: {e}");
                }
            }
        }
        Self::from_sockets(bound)
    }

    pub(crate) fn from_sockets(
        bound: Vec<(String, Ipv4Addr, UdpSocket)>,
    ) -> Result<Self, DiscoveryError> {
        if bound.is_empty() {
            return Err(DiscoveryError::NoInterfaces);
        }
        let addresses = bound.iter().map(|(_, addr, _)| *addr).collect();
        let sockets = bound
            .into_iter()
            .map(|(name, _, socket)| BoundSocket { name, socket })
            .collect();
        Ok(Self { sockets, addresses })
    }

    /// Coordinator addresses advertised in replies, in bind order.
    pub fn addresses(&self) -> &[Ipv4Addr] {
        &self.addresses
    }

    /// Answers requests on every socket until `cancel` fires.
    pub async fn run(self, events: mpsc::Sender<DiscoveryEvent>, cancel: CancellationToken) {
        let reply = encode_server_reply(&self.addresses);
        let mut tasks = JoinSet::new();

        for bound in self.sockets {
            tasks.spawn(serve(bound, reply.clone(), events.clone(), cancel.clone()));
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("discovery listener stopped");
    }
}

fn bind_multicast(config: &DiscoveryConfig, iface: Ipv4Addr) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port).into())?;
    socket.join_multicast_v4(&config.group, &iface)?;
    Ok(socket.into())
}

async fn serve(
    bound: BoundSocket,
    reply: String,
    events: mpsc::Sender<DiscoveryEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            ready = bound.socket.readable() => {
                if let Err(e) = ready {
                    tracing::error!(interface = %bound.name, "discovery socket error: {e}");
                    break;
                }
                let Some((pending, requester)) = drain(&bound.socket) else {
                    continue;
                };
                if !is_server_request(&pending) {
                    continue;
                }
                answer(&bound, &reply, requester, &events).await;
            }
        }
    }
}

/// Reads every queued datagram into one buffer. Returns the bytes and the
/// address of the last sender, or `None` if nothing was queued.
fn drain(socket: &UdpSocket) -> Option<(Vec<u8>, SocketAddr)> {
    let mut pending = Vec::new();
    let mut last_sender = None;
    let mut buf = vec![0u8; DATAGRAM_BUF_SIZE];

    loop {
        match socket.try_recv_from(&mut buf) {
            Ok((len, from)) => {
                pending.extend_from_slice(&buf[..len]);
                last_sender = Some(from);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                tracing::warn!("discovery read error: {e}");
                break;
            }
        }
    }

    last_sender.map(|from| (pending, from))
}

async fn answer(
    bound: &BoundSocket,
    reply: &str,
    requester: SocketAddr,
    events: &mpsc::Sender<DiscoveryEvent>,
) {
    tracing::debug!(interface = %bound.name, %requester, "server request");

    match bound.socket.send_to(reply.as_bytes(), requester).await {
        Ok(written) if written != reply.len() => {
            tracing::warn!(%requester, written, expected = reply.len(), "short discovery reply");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(%requester, "discovery reply failed: {e}"),
    }

    let event = DiscoveryEvent::ServerRequested {
        peer: requester.ip(),
    };
    if events.send(event).await.is_err() {
        tracing::debug!("no discovery event consumer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn loopback_listener() -> (DiscoveryListener, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let listener = DiscoveryListener::from_sockets(vec![(
            "lo".into(),
            Ipv4Addr::new(192, 168, 1, 10),
            socket,
        )])
        .unwrap();
        (listener, addr)
    }

    #[test]
    fn no_interfaces_is_an_error() {
        let err = DiscoveryListener::from_sockets(Vec::new()).err().unwrap();
        assert!(matches!(err, DiscoveryError::NoInterfaces));
    }

    #[test]
    fn default_config_uses_well_known_group() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.port, 45453);
        assert_eq!(config.group, Ipv4Addr::new(224, 0, 0, 1));
    }

    #[tokio::test]
    async fn answers_server_request_and_reports_peer() {
        let (listener, addr) = loopback_listener().await;
        assert_eq!(listener.addresses(), &[Ipv4Addr::new(192, 168, 1, 10)]);

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(tx, cancel.clone()));

        let panel = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        panel
            .send_to(b"<getServer>panel</getServer>", addr)
            .await
            .unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), panel.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"<serverIP>192.168.1.10,0</serverIP>");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            DiscoveryEvent::ServerRequested {
                peer: IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn ignores_other_datagrams() {
        let (listener, addr) = loopback_listener().await;
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(tx, cancel.clone()));

        let panel = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        panel.send_to(b"<getStatus>1</getStatus>", addr).await.unwrap();

        let quiet = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(quiet.is_err());

        cancel.cancel();
        task.await.unwrap();
    }
}
