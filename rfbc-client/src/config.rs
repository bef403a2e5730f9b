//! Client configuration.

use crate::errors::ClientError;

/// Connection settings for [`Client::connect`](crate::Client::connect).
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port (typically 5900 + display number).
    pub port: u16,
    /// Request a shared session so other clients stay connected.
    pub shared: bool,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            shared: true,
        }
    }

    /// Ask the server to disconnect other clients.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.shared = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.host.is_empty() {
            return Err(ClientError::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must not be zero".into()));
        }
        Ok(())
    }
}
