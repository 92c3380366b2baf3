//! Error types for the WebSocket protocol engine.
//!
//! This module defines all error conditions that can occur during framing,
//! handshake, and session operations, following RFC 6455 requirements.

use thiserror::Error;

use crate::session::CloseData;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Reserved bits set; no extensions are negotiated.
    #[error("Unsupported extension: reserved bits set")]
    UnsupportedExtension,

    /// Declared frame size exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Reassembled message size exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked frame received in strict server mode.
    #[error("Client frame must be masked")]
    UnmaskedFrame,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// WebSocket handshake failed (status/header/key mismatch or rejection).
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Handshake head exceeds the size limit.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual handshake size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Caller-supplied header value contains CR or LF.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// The offending header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The session has been closed; carries the terminal close state.
    #[error("Session closed: {0}")]
    Closed(CloseData),

    /// End of stream reached while reading.
    #[error("Unexpected end of stream")]
    Eof,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether this error is a protocol-level violation that warrants a
    /// Close(1002) frame before tearing the connection down.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::InvalidFrame(_)
                | Error::ProtocolViolation(_)
                | Error::InvalidUtf8
                | Error::UnsupportedExtension
                | Error::FrameTooLarge { .. }
                | Error::MessageTooLarge { .. }
                | Error::TooManyFragments { .. }
                | Error::FragmentedControlFrame
                | Error::ControlFrameTooLarge(_)
                | Error::UnmaskedFrame
                | Error::ReservedOpcode(_)
                | Error::InvalidOpcode(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Eof
        } else {
            Error::Io(err.to_string())
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
