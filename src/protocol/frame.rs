//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! The codec is pure with respect to policy: it reads exactly one frame from
//! a byte stream and writes exactly one frame to one, enforcing only the
//! caller-supplied inbound size ceiling.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, random_mask};

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// A WebSocket frame as defined in RFC 6455.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
///
/// The in-memory payload is always unmasked; `mask` records whether the frame
/// was (or should be) masked on the wire. RSV bits are never set — the codec
/// supports no extensions and rejects inbound frames that use them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    /// Whether this frame is/should be masked on the wire.
    pub mask: bool,
    /// Frame payload data (unmasked).
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new unmasked frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            mask: false,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = if let Some(code) = code {
            let mut data = code.to_be_bytes().to_vec();
            data.extend_from_slice(reason.as_bytes());
            data
        } else {
            Vec::new()
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Set the on-wire masking flag.
    #[must_use]
    pub const fn masked(mut self, mask: bool) -> Self {
        self.mask = mask;
        self
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Read one frame from a byte stream.
    ///
    /// Any declared payload length greater than `max_frame_size` fails before
    /// the payload buffer is allocated; this is the primary defense against
    /// memory exhaustion from a malicious peer. The returned frame's `mask`
    /// records whether the peer masked it, so callers can enforce role-based
    /// masking rules.
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedExtension` if any RSV bit is set
    /// - `Error::ReservedOpcode` / `Error::InvalidOpcode` for bad opcodes
    /// - `Error::InvalidFrame` if the 64-bit length exceeds the signed range
    /// - `Error::FrameTooLarge` if the declared length exceeds `max_frame_size`
    /// - `Error::Eof` on premature end of stream, `Error::Io` otherwise
    pub fn read_from<R: Read>(input: &mut R, max_frame_size: usize) -> Result<Self> {
        let mut head = [0u8; 2];
        input.read_exact(&mut head)?;

        let byte0 = head[0];
        let byte1 = head[1];

        if byte0 & 0x70 != 0 {
            return Err(Error::UnsupportedExtension);
        }

        let fin = (byte0 & 0x80) != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        let masked = (byte1 & 0x80) != 0;

        let payload_len = match byte1 & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                input.read_exact(&mut ext)?;
                u64::from(u16::from_be_bytes(ext))
            }
            127 => {
                let mut ext = [0u8; 8];
                input.read_exact(&mut ext)?;
                let len = u64::from_be_bytes(ext);
                if len > i64::MAX as u64 {
                    return Err(Error::InvalidFrame(format!(
                        "64-bit payload length {len} exceeds signed range"
                    )));
                }
                len
            }
            small => u64::from(small),
        };

        // Fail fast, before allocating the payload buffer.
        if payload_len > max_frame_size as u64 {
            return Err(Error::FrameTooLarge {
                size: payload_len,
                max: max_frame_size as u64,
            });
        }

        let key = if masked {
            let mut key = [0u8; 4];
            input.read_exact(&mut key)?;
            Some(key)
        } else {
            None
        };

        let mut payload = vec![0u8; payload_len as usize];
        input.read_exact(&mut payload)?;

        if let Some(key) = key {
            apply_mask(&mut payload, key);
        }

        Ok(Frame {
            fin,
            opcode,
            mask: masked,
            payload,
        })
    }

    /// Write this frame to a byte stream.
    ///
    /// If `mask` is set, a fresh random 4-byte key is generated and the
    /// payload is XOR-masked on the wire. RSV bits are always written as zero.
    ///
    /// # Errors
    ///
    /// Only I/O failures, which propagate.
    pub fn write_to<W: Write>(&self, output: &mut W) -> Result<()> {
        let payload_len = self.payload.len();

        let mut header = Vec::with_capacity(14);
        header.push((self.fin as u8) << 7 | self.opcode.as_u8());

        let mask_bit = (self.mask as u8) << 7;
        if payload_len <= 125 {
            header.push(mask_bit | payload_len as u8);
        } else if payload_len <= 0xFFFF {
            header.push(mask_bit | 126);
            header.extend_from_slice(&(payload_len as u16).to_be_bytes());
        } else {
            header.push(mask_bit | 127);
            header.extend_from_slice(&(payload_len as u64).to_be_bytes());
        }

        if self.mask {
            let key = random_mask();
            header.extend_from_slice(&key);
            output.write_all(&header)?;
            let mut masked = self.payload.clone();
            apply_mask(&mut masked, key);
            output.write_all(&masked)?;
        } else {
            output.write_all(&header)?;
            output.write_all(&self.payload)?;
        }

        Ok(())
    }

    /// Validate the frame according to RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Calculate the number of bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 0xFFFF {
            2
        } else {
            8
        };
        let mask_size = if self.mask { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
