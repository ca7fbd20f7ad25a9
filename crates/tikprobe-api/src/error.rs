use thiserror::Error;

/// Top-level error type for the `tikprobe-api` crate.
///
/// Covers every failure mode of a RouterOS API session: socket I/O,
/// timeouts, login rejection, command traps and protocol violations.
/// `tikprobe-core` maps these into device-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, user disabled, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Socket error (connection refused, reset, DNS failure, etc.)
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or request did not finish within the configured limit.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The router closed the socket while a reply was pending.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The session was already released by the caller.
    #[error("Session is not connected")]
    NotConnected,

    // ── Replies ─────────────────────────────────────────────────────
    /// `!trap` reply: the router refused the command.
    #[error("Command {command} failed: {message}")]
    Trap { command: String, message: String },

    /// `!fatal` reply: the router terminated the session.
    #[error("Session terminated by router: {message}")]
    Fatal { message: String },

    /// Malformed word, unknown reply type, or oversized frame.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns `true` if the session that produced this error is unusable
    /// and a fresh connection is required.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Timeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::Fatal { .. }
                | Self::Protocol(_)
        )
    }

    /// Returns `true` if this is a credentials problem rather than a
    /// reachability one.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
