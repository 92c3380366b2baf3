//! WebSocket wire protocol: opcodes, masking, frame codec, and handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::Frame;
pub use handshake::{
    Request, WS_GUID, client_handshake, compute_accept_key, server_handshake,
};
pub use mask::apply_mask;
pub use opcode::OpCode;
