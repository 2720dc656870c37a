//! Panel control channel.
//!
//! Every panel keeps one WebSocket connection to the coordinator's control
//! port. [`ControlService`] owns the [`Registry`] of those connections and
//! the display [`Mode`]; operators drive it through a [`ControlHandle`] and
//! observe it through [`ControlEvent`]s.

pub mod mode;
pub mod registry;
mod service;

use std::net::IpAddr;

pub use mode::{Enablement, Mode, Toggle, Transition};
pub use registry::Registry;
pub use service::{ControlEvent, ControlHandle, ControlService};

/// Capacity of the operator command queue.
pub const COMMAND_BUFFER_SIZE: usize = 64;

/// Errors returned to operators and by service startup.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("server error: {0}")]
    Server(#[from] panelcast_net_server::ServerError),

    #[error("no panel connected")]
    NoPanels,

    #[error("panel {0} is not connected")]
    UnknownPanel(IpAddr),

    #[error("not allowed while in {0:?}")]
    Busy(Mode),

    #[error("control service stopped")]
    Stopped,
}
