//! Thread-safe session layer over the wire protocol.

pub mod reassembly;
pub mod role;
#[allow(clippy::module_inception)]
pub mod session;
pub mod state;

pub use reassembly::Reassembler;
pub use role::Role;
pub use session::{Session, Shutdown};
pub use state::{CloseData, CloseReason};
