//! Connection role: client or server endpoint.

/// Which end of the connection a session occupies.
///
/// The role decides the masking direction: clients mask every frame they
/// send, servers send unmasked and (by default) require masked input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client endpoint: masks outgoing frames.
    Client,
    /// Server endpoint: sends unmasked, expects masked input.
    Server,
}

impl Role {
    /// Whether this endpoint must mask the frames it sends.
    #[must_use]
    pub const fn must_mask(self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether this endpoint expects incoming frames to be masked.
    #[must_use]
    pub const fn expects_masked(self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}
