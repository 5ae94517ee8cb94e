use std::time::Duration;

use percent_encoding::percent_decode_str;
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use url::{Host, Url};

use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::core::transport::Stream;
use crate::proto::codec::Decoder;
use crate::proto::error::{Error, Result};

const DEFAULT_PORT: u16 = 6379;

fn decode_userinfo(uri: &str, raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| Error::InvalidUri {
            message: format!("{:?}: credentials are not UTF-8: {}", uri, e),
        })
}

/// Credentials found in a connection URI or set on the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// ACL user and password: `AUTH user password`.
    UserPassword {
        /// ACL username.
        username: String,
        /// Password for `username`.
        password: String,
    },
    /// Single password or token: `AUTH token`.
    Token(String),
}

impl Credentials {
    pub(crate) fn auth_command(&self) -> Cmd {
        match self {
            Credentials::UserPassword { username, password } => {
                command::auth_with_username(username.as_str(), password.as_str())
            }
            Credentials::Token(token) => command::auth(token.as_str()),
        }
    }
}

/// The parts of a connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    /// TCP port, 6379 when absent.
    pub port: u16,
    /// Whether the scheme asks for TLS (`rediss` or `tls`).
    pub tls: bool,
    /// Credentials to authenticate with, if any.
    pub credentials: Option<Credentials>,
}

impl ConnectInfo {
    /// Parses `scheme://[user:password@]host[:port]` or
    /// `scheme://[:token@]host[:port]`.
    ///
    /// Any scheme is accepted; `rediss` and `tls` select TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] if the URI does not parse or has no host.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::InvalidUri {
            message: format!("{:?}: {}", uri, e),
        })?;

        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => {
                return Err(Error::InvalidUri {
                    message: format!("{:?}: missing host", uri),
                })
            }
        };

        let tls = matches!(url.scheme(), "rediss" | "tls");
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let username = decode_userinfo(uri, url.username())?;
        let password = url
            .password()
            .map(|p| decode_userinfo(uri, p))
            .transpose()?;
        let credentials = match (username.is_empty(), password) {
            (false, Some(password)) => Some(Credentials::UserPassword { username, password }),
            (true, Some(token)) => Some(Credentials::Token(token)),
            (false, None) => Some(Credentials::Token(username)),
            (true, None) => None,
        };

        Ok(Self {
            host,
            port,
            tls,
            credentials,
        })
    }

    /// Returns the `host:port` pair that is dialed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Everything the factory needs to produce a ready connection.
#[derive(Debug, Clone)]
pub(crate) struct ConnectOptions {
    pub(crate) info: ConnectInfo,
    pub(crate) client_name: Option<String>,
    pub(crate) connection_timeout: Option<Duration>,
    pub(crate) max_frame_size: Option<usize>,
}

/// Connects to the server named by `uri`.
///
/// Credentials in the URI are percent-decoded and sent with AUTH before
/// the connection is returned, so `redis://:p%40ss@host` authenticates
/// with `p@ss`.
///
/// # Example
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> redlink::Result<()> {
/// let conn = redlink::connect("redis://:secret@127.0.0.1:6379").await?;
/// conn.execute("SET greeting hello").await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// - [`Error::InvalidUri`] before any socket is created
/// - [`Error::Connect`] if the TCP connection fails or times out
/// - [`Error::TlsHandshake`] if the TLS handshake fails
/// - [`Error::Auth`] if AUTH is rejected
pub async fn connect(uri: &str) -> Result<Connection> {
    let info = ConnectInfo::parse(uri)?;
    establish(ConnectOptions {
        info,
        client_name: None,
        connection_timeout: None,
        max_frame_size: None,
    })
    .await
}

/// Blocking variant of [`connect`].
///
/// Must be called from a thread that has entered a multi-threaded tokio
/// runtime but is not running an async task, for example inside
/// `tokio::task::spawn_blocking`.
pub fn connect_blocking(uri: &str) -> Result<Connection> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| Error::InvalidArgument {
        message: "no tokio runtime available".to_string(),
    })?;
    handle.block_on(connect(uri))
}

#[instrument(skip(opts), fields(address = %opts.info.address(), tls = opts.info.tls), level = "debug")]
pub(crate) async fn establish(opts: ConnectOptions) -> Result<Connection> {
    let open = open_transport(&opts.info);
    let stream = match opts.connection_timeout {
        Some(limit) => tokio::time::timeout(limit, open)
            .await
            .map_err(|_| Error::Connect {
                address: opts.info.address(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            })??,
        None => open.await?,
    };

    let decoder = match opts.max_frame_size {
        Some(size) => Decoder::with_max_frame_size(size),
        None => Decoder::new(),
    };
    let conn = Connection::new(stream, opts.info.tls, decoder);

    if let Some(credentials) = &opts.info.credentials {
        let reply = conn.execute(&credentials.auth_command().to_string()).await;
        let failure = match reply {
            Ok(values) => values.iter().find_map(|v| v.as_error().map(str::to_string)),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = failure {
            conn.close();
            return Err(Error::Auth { message });
        }
        debug!("authenticated");
    }

    if let Some(name) = &opts.client_name {
        let values = conn
            .execute(&command::client_setname(name.as_str()).to_string())
            .await?;
        if let Some(message) = values.iter().find_map(|v| v.as_error()) {
            let message = message.to_string();
            conn.close();
            return Err(Error::Server { message });
        }
    }

    Ok(conn)
}

async fn open_transport(info: &ConnectInfo) -> Result<Box<dyn Stream>> {
    let address = info.address();
    let tcp = TcpStream::connect((info.host.as_str(), info.port))
        .await
        .map_err(|source| Error::Connect {
            address: address.clone(),
            source,
        })?;
    tcp.set_nodelay(true)
        .map_err(|source| Error::Connect { address, source })?;

    if !info.tls {
        return Ok(Box::new(tcp));
    }

    wrap_tls(tcp, &info.host).await
}

cfg_if::cfg_if! {
    if #[cfg(feature = "tls")] {
        async fn wrap_tls(tcp: TcpStream, host: &str) -> Result<Box<dyn Stream>> {
            let stream = crate::core::tls::TlsConnectorInner::new()
                .handshake(tcp, host)
                .await?;
            Ok(Box::new(stream))
        }
    } else {
        async fn wrap_tls(_tcp: TcpStream, _host: &str) -> Result<Box<dyn Stream>> {
            Err(Error::TlsHandshake {
                message: "TLS support requires the `tls` feature".to_string(),
            })
        }
    }
}
