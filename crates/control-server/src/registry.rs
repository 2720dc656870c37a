//! Address-keyed set of live panel connections.

use std::collections::BTreeMap;
use std::net::IpAddr;

use panelcast_net_server::{Connection, ConnectionId};

/// At most one connection per panel address, iterated in address order.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<IpAddr, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `conn`, first closing and discarding any connection from the
    /// same address. Returns the evicted connection.
    pub fn register(&mut self, conn: Connection) -> Option<Connection> {
        let addr = conn.ip();
        let evicted = self.evict(addr);
        if let Some(old) = &evicted {
            tracing::info!(peer = %addr, old = %old.id(), new = %conn.id(), "replacing panel connection");
        }
        self.entries.insert(addr, conn);
        evicted
    }

    /// Closes and removes whatever connection `addr` holds.
    pub fn evict(&mut self, addr: IpAddr) -> Option<Connection> {
        let old = self.entries.remove(&addr)?;
        old.close();
        Some(old)
    }

    /// Removes the entry for `addr` only if it is still connection `id`.
    ///
    /// Returns `false` (and logs) when the address is absent or now held by
    /// a newer connection.
    pub fn remove(&mut self, addr: IpAddr, id: ConnectionId) -> bool {
        match self.entries.get(&addr) {
            Some(current) if current.id() == id => {
                self.entries.remove(&addr);
                true
            }
            Some(current) => {
                tracing::debug!(peer = %addr, stale = %id, current = %current.id(), "ignoring removal of replaced connection");
                false
            }
            None => {
                tracing::debug!(peer = %addr, "removal of unknown panel");
                false
            }
        }
    }

    pub fn get(&self, addr: IpAddr) -> Option<&Connection> {
        self.entries.get(&addr)
    }

    /// `true` if `conn` is the connection currently held for its address.
    pub fn is_current(&self, conn: &Connection) -> bool {
        self.get(conn.ip()).is_some_and(|c| c.id() == conn.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.entries.values()
    }

    /// Closes every connection and empties the registry.
    pub fn close_all(&mut self) {
        for (_, conn) in std::mem::take(&mut self.entries) {
            conn.close();
        }
    }
}
