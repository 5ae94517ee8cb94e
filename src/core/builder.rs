use std::time::Duration;

use crate::core::factory::{self, ConnectInfo, ConnectOptions, Credentials};
use crate::{Connection, Error};

/// Builder for configuring and creating a [`Connection`].
///
/// Values set on the builder take precedence over the ones found in the
/// address and are used as given, without percent-decoding.
///
/// # Example
///
/// ```no_run
/// use redlink::ClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = ClientBuilder::new()
///     .address("redis://localhost:6379")
///     .password("s3cr@t")
///     .client_name("reporting")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    address: Option<String>,
    password: Option<String>,
    username: Option<String>,
    client_name: Option<String>,
    connection_timeout: Option<Duration>,
    tls: bool,
    max_frame_size: Option<usize>,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    ///
    /// # Arguments
    ///
    /// * `address` - Address in format `redis://host:port` or `rediss://host:port` for TLS
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the password for authentication.
    #[inline]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the username for ACL authentication.
    ///
    /// Only used together with a password.
    #[inline]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the client connection name.
    ///
    /// # Arguments
    ///
    /// * `name` - Client name displayed in `CLIENT LIST`
    #[inline]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Sets the connection timeout.
    ///
    /// Bounds the TCP connect and the TLS handshake. Commands themselves
    /// have no timeout.
    #[inline]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Forces TLS even when the address scheme is plaintext.
    #[inline]
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Sets the largest bulk string or buffered reply accepted.
    #[inline]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    fn into_options(self) -> Result<ConnectOptions, Error> {
        let address = self.address.ok_or_else(|| Error::InvalidArgument {
            message: "address is required".to_string(),
        })?;
        let mut info = ConnectInfo::parse(&address)?;
        info.tls |= self.tls;

        if let Some(password) = self.password {
            info.credentials = Some(match self.username {
                Some(username) => Credentials::UserPassword { username, password },
                None => Credentials::Token(password),
            });
        }

        Ok(ConnectOptions {
            info,
            client_name: self.client_name,
            connection_timeout: self.connection_timeout,
            max_frame_size: self.max_frame_size,
        })
    }

    /// Connects and returns a ready [`Connection`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if address is not set, and the
    /// errors of [`connect`](crate::connect) otherwise.
    #[inline]
    pub async fn build(self) -> Result<Connection, Error> {
        let options = self.into_options()?;
        factory::establish(options).await
    }
}
