use std::io;

use thiserror::Error;

/// Result type alias for redlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while connecting to or talking with a Redis server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred on an established transport.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The connection URI could not be parsed.
    #[error("invalid URI: {message}")]
    InvalidUri {
        /// Description of what is wrong with the URI.
        message: String,
    },

    /// The TCP connection could not be established.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The `host:port` that was dialed.
        address: String,
        /// The underlying IO error.
        source: io::Error,
    },

    /// The TLS handshake failed or TLS is unavailable.
    #[error("TLS handshake failed: {message}")]
    TlsHandshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// Error reply from the server, or the transport failure.
        message: String,
    },

    /// The connection is closed, was never opened, or was closed while a
    /// command was in flight.
    #[error("connection closed")]
    Closed,

    /// The reply bytes did not form a valid RESP frame.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an error reply where success was required.
    #[error("server error: {message}")]
    Server {
        /// Error message from server.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Returns true if this error means the transport is gone and the
    /// connection can no longer be used.
    pub fn is_connection_dropped(&self) -> bool {
        match self {
            Error::Closed => true,
            Error::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
