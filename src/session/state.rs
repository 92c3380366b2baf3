//! Terminal close state for a session.
//!
//! Once a session closes it never reopens; the first cause to be recorded
//! wins and every later observation sees the same `CloseData`.

use std::fmt;

use crate::message::CloseFrame;

/// Why a session reached its closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// This endpoint initiated the close.
    Locally,
    /// The peer sent a Close frame.
    Remotely,
    /// The underlying stream ended without a Close frame.
    Eof,
    /// A protocol or I/O error tore the session down.
    Error,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Locally => write!(f, "closed locally"),
            CloseReason::Remotely => write!(f, "closed by peer"),
            CloseReason::Eof => write!(f, "end of stream"),
            CloseReason::Error => write!(f, "closed on error"),
        }
    }
}

/// The immutable record of how and why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseData {
    /// What caused the close.
    pub reason: CloseReason,
    /// Description of the triggering error, when `reason` is `Error`.
    pub error: Option<String>,
    /// The peer's Close frame code and reason, when the peer sent one.
    pub peer_close: Option<CloseFrame>,
    /// Application payload attached to the local Close frame, if any.
    pub extra: Option<Vec<u8>>,
}

impl CloseData {
    /// Close state for a locally initiated close.
    #[must_use]
    pub const fn local(extra: Option<Vec<u8>>) -> Self {
        Self {
            reason: CloseReason::Locally,
            error: None,
            peer_close: None,
            extra,
        }
    }

    /// Close state recording the peer's Close frame.
    #[must_use]
    pub const fn remote(peer_close: Option<CloseFrame>) -> Self {
        Self {
            reason: CloseReason::Remotely,
            error: None,
            peer_close,
            extra: None,
        }
    }

    /// Close state for a stream that ended without a Close frame.
    #[must_use]
    pub const fn eof() -> Self {
        Self {
            reason: CloseReason::Eof,
            error: None,
            peer_close: None,
            extra: None,
        }
    }

    /// Close state for a failure.
    #[must_use]
    pub fn error(err: impl fmt::Display) -> Self {
        Self {
            reason: CloseReason::Error,
            error: Some(err.to_string()),
            peer_close: None,
            extra: None,
        }
    }
}

impl fmt::Display for CloseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(err) = &self.error {
            write!(f, " ({err})")?;
        }
        if let Some(close) = &self.peer_close {
            write!(f, " [{close}]")?;
        }
        Ok(())
    }
}
