//! Fragmented message reassembly.
//!
//! Data frames arrive as an initial Text or Binary frame followed by zero or
//! more Continuation frames; the final fragment carries FIN. The reassembler
//! folds that sequence into complete [`Message`]s while enforcing the
//! fragmentation rules of RFC 6455 section 5.4 and the configured limits.

use bytes::BytesMut;
use log::trace;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// The data type a fragment sequence started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataKind {
    Text,
    Binary,
}

/// Where the reassembler is in a fragment sequence.
#[derive(Debug)]
enum ReassemblyState {
    /// No message in flight; the next data frame must be Text or Binary.
    Idle,
    /// Collecting fragments of one message.
    Accumulating {
        kind: DataKind,
        buffer: BytesMut,
        fragments: usize,
    },
}

/// Folds data frames into complete messages.
#[derive(Debug)]
pub struct Reassembler {
    state: ReassemblyState,
    limits: Limits,
}

impl Reassembler {
    /// Create a reassembler enforcing the given limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            state: ReassemblyState::Idle,
            limits,
        }
    }

    /// Feed one data frame; returns a complete message when FIN closes the
    /// sequence, `None` while more fragments are expected.
    ///
    /// # Errors
    ///
    /// `Error::ProtocolViolation` for a Continuation with no message in
    /// flight or a new Text/Binary frame while one is; limit errors when the
    /// accumulated size or fragment count exceeds the configuration;
    /// `Error::InvalidUtf8` when a finished Text message is not valid UTF-8.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (&mut self.state, frame.opcode) {
            (ReassemblyState::Idle, OpCode::Text | OpCode::Binary) => {
                let kind = if frame.opcode == OpCode::Text {
                    DataKind::Text
                } else {
                    DataKind::Binary
                };
                if frame.fin {
                    return Self::finish(kind, frame.into_payload()).map(Some);
                }
                self.limits.check_message_size(frame.payload().len())?;
                trace!("starting fragmented {kind:?} message");
                self.state = ReassemblyState::Accumulating {
                    kind,
                    buffer: BytesMut::from(frame.payload()),
                    fragments: 1,
                };
                Ok(None)
            }
            (ReassemblyState::Idle, OpCode::Continuation) => Err(Error::ProtocolViolation(
                "Continuation frame with no message in progress".into(),
            )),
            (ReassemblyState::Accumulating { .. }, OpCode::Text | OpCode::Binary) => {
                Err(Error::ProtocolViolation(
                    "New data frame while a fragmented message is in progress".into(),
                ))
            }
            (
                ReassemblyState::Accumulating {
                    kind,
                    buffer,
                    fragments,
                },
                OpCode::Continuation,
            ) => {
                *fragments += 1;
                self.limits.check_fragment_count(*fragments)?;
                self.limits
                    .check_message_size(buffer.len() + frame.payload().len())?;
                buffer.extend_from_slice(frame.payload());

                if frame.fin {
                    let kind = *kind;
                    let payload = std::mem::take(buffer).to_vec();
                    let count = *fragments;
                    self.state = ReassemblyState::Idle;
                    trace!("reassembled message from {count} fragments ({} bytes)", payload.len());
                    return Self::finish(kind, payload).map(Some);
                }
                Ok(None)
            }
            // Control frames are handled by the read loop before reassembly.
            (_, op) => Err(Error::ProtocolViolation(format!(
                "Control frame {op} reached the reassembler"
            ))),
        }
    }

    /// Whether a fragmented message is currently in flight.
    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, ReassemblyState::Accumulating { .. })
    }

    fn finish(kind: DataKind, payload: Vec<u8>) -> Result<Message> {
        match kind {
            DataKind::Text => {
                let text = String::from_utf8(payload).map_err(|_| Error::InvalidUtf8)?;
                Ok(Message::Text(text))
            }
            DataKind::Binary => Ok(Message::Binary(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassembler() -> Reassembler {
        Reassembler::new(Limits::default())
    }

    #[test]
    fn test_unfragmented_text() {
        let mut r = reassembler();
        let msg = r.push(Frame::text("hello")).unwrap();
        assert_eq!(msg, Some(Message::text("hello")));
        assert!(!r.is_accumulating());
    }

    #[test]
    fn test_unfragmented_binary() {
        let mut r = reassembler();
        let msg = r.push(Frame::binary(vec![1, 2, 3])).unwrap();
        assert_eq!(msg, Some(Message::Binary(vec![1, 2, 3])));
    }

    #[test]
    fn test_three_fragment_text() {
        let mut r = reassembler();

        let mut first = Frame::text("Hel");
        first.fin = false;
        assert_eq!(r.push(first).unwrap(), None);
        assert!(r.is_accumulating());

        let middle = Frame::new(false, OpCode::Continuation, b"lo ".to_vec());
        assert_eq!(r.push(middle).unwrap(), None);

        let last = Frame::new(true, OpCode::Continuation, b"World".to_vec());
        let msg = r.push(last).unwrap();
        assert_eq!(msg, Some(Message::text("Hello World")));
        assert!(!r.is_accumulating());
    }

    #[test]
    fn test_continuation_without_start() {
        let mut r = reassembler();
        let err = r
            .push(Frame::new(true, OpCode::Continuation, vec![1]))
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert!(err.is_protocol());
    }

    #[test]
    fn test_new_data_frame_while_accumulating() {
        let mut r = reassembler();
        let mut first = Frame::text("a");
        first.fin = false;
        r.push(first).unwrap();

        let err = r.push(Frame::text("b")).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn test_invalid_utf8_on_finish() {
        let mut r = reassembler();
        // 0xC3 starts a two-byte sequence; splitting it across fragments is
        // legal, but the assembled whole here is truncated.
        let first = Frame::new(false, OpCode::Text, vec![0x48, 0xC3]);
        r.push(first).unwrap();

        let err = r
            .push(Frame::new(true, OpCode::Continuation, vec![]))
            .unwrap_err();
        assert_eq!(err, Error::InvalidUtf8);
    }

    #[test]
    fn test_utf8_split_across_fragments() {
        let mut r = reassembler();
        // "é" = 0xC3 0xA9 split across two fragments.
        let first = Frame::new(false, OpCode::Text, vec![0xC3]);
        r.push(first).unwrap();

        let msg = r
            .push(Frame::new(true, OpCode::Continuation, vec![0xA9]))
            .unwrap();
        assert_eq!(msg, Some(Message::text("é")));
    }

    #[test]
    fn test_fragment_count_limit() {
        let limits = Limits {
            max_fragment_count: 3,
            ..Limits::default()
        };
        let mut r = Reassembler::new(limits);

        let mut first = Frame::text("x");
        first.fin = false;
        r.push(first).unwrap();

        // Fragments two and three are still within the limit of three.
        let cont = Frame::new(false, OpCode::Continuation, b"x".to_vec());
        assert_eq!(r.push(cont.clone()).unwrap(), None);
        assert_eq!(r.push(cont.clone()).unwrap(), None);

        // The fourth fragment exceeds it.
        let err = r.push(cont).unwrap_err();
        assert!(matches!(err, Error::TooManyFragments { count: 4, max: 3 }));
    }

    #[test]
    fn test_message_size_limit() {
        let limits = Limits {
            max_message_size: 10,
            ..Limits::default()
        };
        let mut r = Reassembler::new(limits);

        let mut first = Frame::binary(vec![0u8; 8]);
        first.fin = false;
        r.push(first).unwrap();

        let err = r
            .push(Frame::new(true, OpCode::Continuation, vec![0u8; 8]))
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 16, max: 10 }));
    }

    #[test]
    fn test_control_frame_rejected() {
        let mut r = reassembler();
        let err = r.push(Frame::ping(vec![])).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn test_reusable_after_message() {
        let mut r = reassembler();
        r.push(Frame::text("one")).unwrap();
        let msg = r.push(Frame::text("two")).unwrap();
        assert_eq!(msg, Some(Message::text("two")));
    }
}
