//! Error types for the RFB client.

use std::io;
use thiserror::Error;

/// Errors raised while connecting to or talking with a server.
///
/// Most of these tear down the current connection and are retried by the
/// transport loop; see [`ClientError::is_fatal`] for the ones that stop the
/// client instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server's version line was malformed or older than RFB 3.3.
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),

    /// The server offered security types, but not "None".
    #[error("server offers no compatible security type")]
    NoCompatibleSecurity,

    /// The server rejected the security handshake.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The server's pixel format is not the 32-bit layout this client
    /// decodes.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// A server-to-client message id this client does not understand.
    #[error("unknown server message {0}")]
    UnknownMessage(u8),

    /// A rectangle payload failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] anyhow::Error),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configured hostname did not resolve.
    #[error("could not resolve {0}")]
    Resolution(String),

    /// The transport thread could not be started.
    #[error("could not spawn transport thread: {0}")]
    Spawn(io::Error),

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether this error stops the client rather than triggering a
    /// reconnect attempt.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Resolution(_) | Self::Spawn(_) | Self::Config(_)
        )
    }
}
