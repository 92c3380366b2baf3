//! Frame opcodes (RFC 6455 section 5.2).

use crate::error::{Error, Result};

/// The 4-bit opcode carried in every frame header.
///
/// Values 0x3-0x7 and 0xB-0xF are reserved by the RFC and rejected on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// A non-initial fragment of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text data.
    Text = 0x1,
    /// Arbitrary binary data.
    Binary = 0x2,
    /// Closing handshake; payload optionally carries a code and reason.
    Close = 0x8,
    /// Keepalive probe; must be answered with a Pong echoing the payload.
    Ping = 0x9,
    /// Answer to a Ping, or an unsolicited heartbeat.
    Pong = 0xA,
}

impl OpCode {
    /// Decode a raw opcode value.
    ///
    /// # Errors
    ///
    /// `Error::ReservedOpcode` for the RFC-reserved ranges,
    /// `Error::InvalidOpcode` for anything that does not fit in 4 bits.
    pub const fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            0x3..=0x7 | 0xB..=0xF => return Err(Error::ReservedOpcode(value)),
            _ => return Err(Error::InvalidOpcode(value)),
        })
    }

    /// The raw 4-bit value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping, and Pong are control opcodes; they are handled inline by
    /// the read loop and may never be fragmented.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }

    /// Continuation, Text, and Binary carry (fragments of) application data.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        !self.is_control()
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Continuation => "Continuation",
            Self::Text => "Text",
            Self::Binary => "Binary",
            Self::Close => "Close",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
        })
    }
}
