//! Thread-safe WebSocket session over a blocking duplex stream.
//!
//! A [`Session`] owns a stream whose shared reference implements both `Read`
//! and `Write` (as `TcpStream` does), so one thread can block in [`Session::read`]
//! while another calls [`Session::write`]. The read and write sides are
//! guarded by separate locks that are never held together, except that the
//! read loop briefly takes the write lock to answer Ping and Close frames.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use log::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::{CLOSE_PROTOCOL_ERROR, CloseFrame, Message};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::{Frame, OpCode};
use crate::session::reassembly::Reassembler;
use crate::session::role::Role;
use crate::session::state::CloseData;

/// Streams that can signal end-of-connection to the peer.
///
/// Shutting the socket down unblocks a reader parked in a blocking read on
/// another thread, which is how [`Session::close`] interrupts a concurrent
/// [`Session::read`].
pub trait Shutdown {
    /// Shut down both directions of the stream.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn shutdown(&self) -> std::io::Result<()>;
}

impl Shutdown for TcpStream {
    fn shutdown(&self) -> std::io::Result<()> {
        TcpStream::shutdown(self, std::net::Shutdown::Both)
    }
}

/// Recover the guard from a poisoned lock; session state stays consistent
/// because every mutation happens-before the poison is observed.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A WebSocket session over an established, already-upgraded stream.
///
/// All methods take `&self`; the session is meant to be shared across threads
/// (typically via `Arc`). Once closed, for any reason, every subsequent call
/// fails with [`Error::Closed`] carrying the same immutable [`CloseData`].
pub struct Session<S> {
    stream: S,
    role: Role,
    config: Config,
    /// Read-side lock; also owns the reassembly state.
    reader: Mutex<Reassembler>,
    /// Write-side lock, serializing frame writes.
    writer: Mutex<()>,
    /// Terminal close state; the first writer wins.
    close_state: OnceLock<CloseData>,
    /// Whether a Close frame has been sent on this session.
    close_sent: AtomicBool,
    /// Whether the underlying socket has been shut down.
    socket_down: AtomicBool,
    /// Number of Pong frames received.
    pongs: AtomicU64,
}

impl<S> Session<S>
where
    S: Shutdown,
    for<'a> &'a S: Read + Write,
{
    /// Wrap an upgraded stream in a session with the given role.
    pub fn new(stream: S, role: Role, config: Config) -> Self {
        Self {
            stream,
            role,
            reader: Mutex::new(Reassembler::new(config.limits.clone())),
            config,
            writer: Mutex::new(()),
            close_state: OnceLock::new(),
            close_sent: AtomicBool::new(false),
            socket_down: AtomicBool::new(false),
            pongs: AtomicU64::new(0),
        }
    }

    /// Wrap a stream as the client end of the connection.
    pub fn client(stream: S, config: Config) -> Self {
        Self::new(stream, Role::Client, config)
    }

    /// Wrap a stream as the server end of the connection.
    pub fn server(stream: S, config: Config) -> Self {
        Self::new(stream, Role::Server, config)
    }

    /// This session's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// A shared reference to the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Number of Pong frames received so far.
    #[must_use]
    pub fn pong_count(&self) -> u64 {
        self.pongs.load(Ordering::Relaxed)
    }

    /// The terminal close state, if the session has closed.
    #[must_use]
    pub fn close_data(&self) -> Option<CloseData> {
        self.close_state.get().cloned()
    }

    /// Whether the session has reached its closed state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close_state.get().is_some()
    }

    /// Read the next complete message, blocking until one arrives.
    ///
    /// Control frames are handled inline: Pings are answered with Pongs,
    /// Pongs are counted, and a peer Close is echoed (once) and seals the
    /// session. Fragmented messages are reassembled transparently.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the session is closed (by either side, EOF, or
    /// a previous failure). A protocol violation by the peer sends a
    /// best-effort Close with code 1002, seals the session, and surfaces the
    /// violation. I/O errors seal the session and propagate.
    pub fn read(&self) -> Result<Message> {
        self.check_open()?;
        let mut reassembler = lock(&self.reader);
        // The session may have closed while this thread waited for the lock.
        self.check_open()?;

        match self.read_message(&mut reassembler) {
            Ok(message) => Ok(message),
            Err(err) => Err(self.fail_read(err)),
        }
    }

    /// Send a data message.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the session is closed; I/O failures seal the
    /// session and propagate.
    pub fn write(&self, message: Message) -> Result<()> {
        self.check_open()?;
        let guard = lock(&self.writer);
        self.check_open()?;

        let frame = match message {
            Message::Text(text) => Frame::text(text),
            Message::Binary(data) => Frame::binary(data),
        };
        if let Err(err) = self.write_frame(&frame) {
            drop(guard);
            self.seal(CloseData::error(&err));
            self.shutdown_socket();
            return Err(err);
        }
        Ok(())
    }

    /// Close the session, optionally attaching an application payload to the
    /// outgoing Close frame.
    ///
    /// Idempotent: the first close (local or remote) wins, every call returns
    /// the same terminal [`CloseData`]. The Close frame is sent best-effort
    /// and the socket is shut down, which unblocks a concurrent reader.
    pub fn close(&self, extra: Option<Vec<u8>>) -> CloseData {
        if self
            .close_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _guard = lock(&self.writer);
            let frame = match &extra {
                Some(payload) => Frame::new(true, OpCode::Close, payload.clone()),
                None => Frame::close(Some(1000), ""),
            };
            if let Err(err) = self.write_frame(&frame) {
                debug!("close frame send failed: {err}");
            }
        }
        let sealed = self.seal(CloseData::local(extra));
        self.shutdown_socket();
        sealed
    }

    /// Read frames until one complete message is assembled.
    fn read_message(&self, reassembler: &mut Reassembler) -> Result<Message> {
        loop {
            let frame =
                Frame::read_from(&mut &self.stream, self.config.limits.max_frame_size)?;
            trace!("{} received {} frame ({} bytes)", self.role, frame.opcode, frame.payload().len());

            if self.role.expects_masked()
                && !frame.mask
                && !self.config.accept_unmasked_frames
            {
                return Err(Error::UnmaskedFrame);
            }

            if frame.opcode.is_control() {
                frame.validate()?;
                match frame.opcode {
                    OpCode::Close => return Err(self.handle_remote_close(&frame)),
                    OpCode::Ping => {
                        let _guard = lock(&self.writer);
                        self.write_frame(&Frame::pong(frame.into_payload()))?;
                    }
                    OpCode::Pong => {
                        self.pongs.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
                continue;
            }

            if let Some(message) = reassembler.push(frame)? {
                return Ok(message);
            }
        }
    }

    /// Handle a Close frame from the peer: echo it once, seal the session,
    /// and produce the error the reader surfaces.
    fn handle_remote_close(&self, frame: &Frame) -> Error {
        let payload = frame.payload();
        let peer_close = if payload.len() >= 2 {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
            CloseFrame::new(code, reason)
        } else {
            CloseFrame::new(0, "peer sent close without a status code")
        };
        debug!("{} received close: {peer_close}", self.role);

        if self
            .close_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // The 2-byte code leaves 123 bytes of control-frame payload for
            // the reason; the prefix can push a long peer reason past that,
            // so truncate at a char boundary to keep the echo wire-legal.
            let mut reason = format!("Echo: {}", peer_close.reason);
            let max_reason = MAX_CONTROL_FRAME_PAYLOAD - 2;
            if reason.len() > max_reason {
                let mut cut = max_reason;
                while !reason.is_char_boundary(cut) {
                    cut -= 1;
                }
                reason.truncate(cut);
            }
            let echo = Frame::close(Some(peer_close.code), &reason);
            let _guard = lock(&self.writer);
            if let Err(err) = self.write_frame(&echo) {
                debug!("close echo failed: {err}");
            }
        }

        let sealed = self.seal(CloseData::remote(Some(peer_close)));
        self.shutdown_socket();
        Error::Closed(sealed)
    }

    /// Turn a read failure into the error surfaced to the caller, sealing the
    /// session and tearing the connection down.
    fn fail_read(&self, err: Error) -> Error {
        if matches!(err, Error::Closed(_)) {
            return err;
        }

        if err.is_protocol()
            && self
                .close_sent
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            warn!("{} protocol violation: {err}", self.role);
            let close = Frame::close(Some(CLOSE_PROTOCOL_ERROR), "");
            let _guard = lock(&self.writer);
            if let Err(send_err) = self.write_frame(&close) {
                debug!("protocol-error close failed: {send_err}");
            }
        }

        let data = match &err {
            Error::Eof => CloseData::eof(),
            other => CloseData::error(other),
        };
        self.seal(data);
        self.shutdown_socket();
        err
    }

    /// Serialize one frame to the stream, masked per this session's role.
    ///
    /// Caller must hold the write lock.
    fn write_frame(&self, frame: &Frame) -> Result<()> {
        let frame = frame.clone().masked(self.role.must_mask());
        let mut output = &self.stream;
        frame.write_to(&mut output)?;
        output.flush()?;
        Ok(())
    }

    /// Fail if the session has closed.
    fn check_open(&self) -> Result<()> {
        match self.close_state.get() {
            Some(data) => Err(Error::Closed(data.clone())),
            None => Ok(()),
        }
    }

    /// Record the terminal close state; the first cause wins and is returned
    /// to every caller thereafter.
    fn seal(&self, data: CloseData) -> CloseData {
        self.close_state.get_or_init(|| data).clone()
    }

    /// Shut the socket down exactly once.
    fn shutdown_socket(&self) {
        if self
            .socket_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Err(err) = self.stream.shutdown() {
                trace!("socket shutdown failed: {err}");
            }
        }
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("close_state", &self.close_state.get())
            .field("close_sent", &self.close_sent.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
