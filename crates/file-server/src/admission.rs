//! What to do when a panel opens a second file connection.

/// Outcome for a new connection from an address already holding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Close the existing connection, keep the new one.
    ReplaceExisting,
    /// Close the new connection, keep the existing one.
    RejectNew,
    /// Close both.
    DropBoth,
}

/// Decides from the liveness of both connections.
///
/// | existing | new   | outcome           |
/// |----------|-------|-------------------|
/// | valid    | any   | `ReplaceExisting` |
/// | invalid  | valid | `RejectNew`       |
/// | invalid  | invalid | `DropBoth`      |
pub fn admit(existing_valid: bool, new_valid: bool) -> Admission {
    match (existing_valid, new_valid) {
        (true, _) => Admission::ReplaceExisting,
        (false, true) => Admission::RejectNew,
        (false, false) => Admission::DropBoth,
    }
}
