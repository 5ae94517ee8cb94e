use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::core::transport::{Stream, Transport};
use crate::proto::codec::Decoder;

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const BUSY: u8 = 2;

/// Usage state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The transport is released; every command fails.
    Closed,
    /// Idle and ready for a command.
    Open,
    /// A command is in flight.
    Busy,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            OPEN => ConnectionState::Open,
            BUSY => ConnectionState::Busy,
            _ => ConnectionState::Closed,
        }
    }
}

/// Transport plus the decoder scoped to it, guarded together.
#[derive(Debug)]
pub(crate) struct Io {
    pub(crate) transport: Transport,
    pub(crate) decoder: Decoder,
    /// Set when a reply was abandoned part way, so leftover bytes may
    /// still be readable before the next command.
    pub(crate) stale: bool,
}

pub(crate) struct Inner {
    /// `None` once the transport has been released. Lock waiters queue in
    /// FIFO order, which is what serializes commands.
    pub(crate) io: Mutex<Option<Io>>,
    state: AtomicU8,
    pub(crate) closed: watch::Sender<bool>,
    tls: bool,
    pub(crate) runtime: Option<Handle>,
}

/// A connection to a Redis server.
///
/// Cloning is cheap: clones share one transport, and commands submitted
/// through any clone are executed strictly one after another. The socket is
/// released when [`close`](Connection::close) is called or when the last
/// clone is dropped.
///
/// # Example
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> redlink::Result<()> {
/// let conn = redlink::connect("redis://127.0.0.1:6379").await?;
/// let values = conn.execute("LRANGE FOO 0 -1").await?;
/// for value in values {
///     println!("{}", value);
/// }
/// conn.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<Inner>,
}

impl Connection {
    /// Wraps an already established byte stream.
    ///
    /// The connection starts out [`Open`](ConnectionState::Open). No
    /// handshake or authentication is performed.
    pub fn from_stream<S: Stream>(stream: S) -> Self {
        Self::new(stream, false, Decoder::new())
    }

    pub(crate) fn new<S: Stream>(stream: S, tls: bool, decoder: Decoder) -> Self {
        let (closed, _) = watch::channel(false);
        let io = Io {
            transport: Transport::new(stream),
            decoder,
            stale: false,
        };
        Self {
            inner: Arc::new(Inner {
                io: Mutex::new(Some(io)),
                state: AtomicU8::new(OPEN),
                closed,
                tls,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Returns the current usage state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Returns true if the connection is open, idle or busy.
    pub fn is_open(&self) -> bool {
        self.state() != ConnectionState::Closed
    }

    /// Returns true while a command is in flight.
    pub fn is_busy(&self) -> bool {
        self.state() == ConnectionState::Busy
    }

    /// Returns true once the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Returns true if the connection runs over TLS.
    pub fn is_tls(&self) -> bool {
        self.inner.tls
    }

    /// Closes the connection.
    ///
    /// The transport is released immediately when idle. A command in flight
    /// is woken up, fails with [`Error::Closed`](crate::Error::Closed) and
    /// releases the transport itself. Closing twice is a no-op.
    pub fn close(&self) {
        if self.inner.state.swap(CLOSED, Ordering::SeqCst) == CLOSED {
            return;
        }
        debug!(tls = self.inner.tls, "closing connection");
        self.inner.closed.send_replace(true);
        if let Ok(mut io) = self.inner.io.try_lock() {
            io.take();
        }
    }

    /// `Open -> Busy`; fails if the connection was closed meanwhile.
    pub(crate) fn acquire(&self) -> bool {
        self.inner
            .state
            .compare_exchange(OPEN, BUSY, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `Busy -> Open`, unless closed meanwhile.
    pub(crate) fn release(&self) {
        let _ = self
            .inner
            .state
            .compare_exchange(BUSY, OPEN, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Drops the transport if the connection was closed while another
    /// caller held it. Must run after that caller unlocked.
    pub(crate) fn reclaim_transport(&self) {
        if !self.is_closed() {
            return;
        }
        // A failed try_lock means the next holder owns it and will see
        // the closed state itself.
        if let Ok(mut io) = self.inner.io.try_lock() {
            io.take();
        }
    }

    /// Marks the connection closed after the transport went away on its own.
    pub(crate) fn mark_closed(&self) {
        self.inner.state.store(CLOSED, Ordering::SeqCst);
        self.inner.closed.send_replace(true);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("tls", &self.inner.tls)
            .finish()
    }
}
