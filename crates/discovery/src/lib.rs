//! Multicast discovery responder.
//!
//! Panels multicast a `<getServer>` datagram; every coordinator socket that
//! hears it answers the sender directly with the coordinator's addresses
//! and reports the request so the control service can drop any stale
//! connection from that panel.

pub mod interfaces;
pub mod listener;

pub use interfaces::{MulticastInterface, local_ipv4_interfaces, wait_for_network};
pub use listener::{DiscoveryConfig, DiscoveryEvent, DiscoveryListener};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no usable multicast interface could be bound")]
    NoInterfaces,
}
