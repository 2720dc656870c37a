//! Wire protocol for coordinator <-> panel communication.
//!
//! Every text frame is a loose sequence of `<tag>value</tag>` elements; the
//! file services additionally answer chunk requests with binary frames
//! whose first chunk carries a fixed-size [`transfer::PREAMBLE_SIZE`]
//! header.

pub mod constants;
pub mod control;
pub mod discovery;
pub mod tags;
pub mod transfer;

// Re-export primary types for convenience.
pub use constants::Tag;
pub use control::{Command, PanelDirection, PanelReport};
pub use tags::{extract, wrap};
pub use transfer::{FileListing, GetRequest};

/// Errors produced while decoding protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("<{tag}> needs {expected} fields, got {got}")]
    MissingFields {
        tag: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("<{tag}> has an invalid value: {value:?}")]
    InvalidValue { tag: &'static str, value: String },

    #[error("preamble needs {len} bytes but only {max} are available")]
    PreambleOverflow { len: usize, max: usize },
}
