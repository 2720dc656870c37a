//! Media file service.
//!
//! Each instance serves one [`Catalog`](panelcast_catalog::Catalog) on its
//! own port, from its own OS thread running a single-threaded runtime.
//! Panels ask for the file list, then pull files in byte ranges; the first
//! chunk of a file carries a fixed-size preamble with its name and size.

pub mod admission;
mod request;
mod server;

pub use admission::{Admission, admit};
pub use server::{FileServerConfig, FileServerEvent, FileServerHandle};

use std::time::Duration;

/// How long [`FileServerHandle::close`] waits before forcing the thread down.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(3000);

/// Capacity of the directory-change request queue.
pub const REQUEST_BUFFER_SIZE: usize = 8;

/// Errors produced by the file service.
#[derive(Debug, thiserror::Error)]
pub enum FileServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(#[from] panelcast_net_server::ServerError),

    #[error("file service stopped")]
    Stopped,
}
