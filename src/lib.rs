//! # websock
//!
//! An RFC 6455 compliant WebSocket engine for blocking I/O: frame codec,
//! HTTP upgrade handshake, and a thread-safe session with transparent
//! fragmentation, Ping/Pong handling, and a first-close-wins shutdown
//! protocol.
//!
//! ## Features
//!
//! - Full RFC 6455 frame parsing and serialization with masking
//! - Client and server HTTP upgrade handshakes over raw streams
//! - Message reassembly with bounded memory (frame, message, and fragment
//!   limits)
//! - Concurrent use from reader and writer threads via `&self` methods
//! - Strict protocol enforcement: violations answer with Close code 1002
//!
//! ## Example
//!
//! ```no_run
//! use std::net::TcpStream;
//! use websock::{Config, Limits, Message, Session, protocol};
//!
//! fn main() -> websock::Result<()> {
//!     let stream = TcpStream::connect("127.0.0.1:9001").map_err(websock::Error::from)?;
//!     protocol::client_handshake(&mut &stream, &mut &stream, "127.0.0.1:9001", "/", &Limits::default())?;
//!
//!     let session = Session::client(stream, Config::default());
//!     session.write(Message::text("hello"))?;
//!     let reply = session.read()?;
//!     println!("got: {reply:?}");
//!     session.close(None);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod protocol;
pub mod session;

pub use config::{Config, Limits};
pub use error::{Error, Result};
pub use message::{CLOSE_PROTOCOL_ERROR, CloseFrame, Message};
pub use protocol::{Frame, OpCode};
pub use session::{CloseData, CloseReason, Role, Session, Shutdown};
