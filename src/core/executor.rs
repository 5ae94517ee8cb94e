use tokio::sync::{watch, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::core::connection::{Connection, Io};
use crate::proto::codec::Decoded;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Value;

/// Number of top-level replies a command text produces: one per non-blank
/// line, so a `MULTI` ... `EXEC` batch written one command per line
/// collects every reply.
pub(crate) fn reply_count(command: &str) -> usize {
    command.lines().filter(|l| !l.trim().is_empty()).count()
}

fn check_command(command: &str) -> Result<usize> {
    match reply_count(command) {
        0 => Err(Error::InvalidArgument {
            message: "command is empty".to_string(),
        }),
        n => Ok(n),
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    // The sender lives as long as the connection, so an error here only
    // means the connection is being torn down.
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Holds the transport for the command in flight.
///
/// Dropped without [`finish`](InFlight::finish), the reply was abandoned
/// half read and cannot be resynced, so the connection is closed.
struct InFlight<'a> {
    conn: &'a Connection,
    guard: MutexGuard<'a, Option<Io>>,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: &Result<()>) {
        self.finished = true;
        match outcome {
            Err(e) if e.is_connection_dropped() => {
                error!(error = %e, "transport lost, releasing connection");
                self.conn.mark_closed();
            }
            Err(e) => {
                debug!(error = %e, "command failed");
                if let Some(io) = self.guard.as_mut() {
                    io.stale = true;
                }
                self.conn.release();
            }
            Ok(()) => self.conn.release(),
        }
        if self.conn.is_closed() {
            self.guard.take();
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("command cancelled mid reply, closing connection");
            self.conn.mark_closed();
            self.guard.take();
        }
    }
}

impl Connection {
    /// Executes a command and collects every decoded leaf value.
    ///
    /// Concurrent callers on the same connection are queued and run one at
    /// a time, in submission order. Dropping the returned future while its
    /// command is in flight closes the connection, as the rest of that
    /// reply would otherwise be read by the next command.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the command is blank
    /// - [`Error::Closed`] if the connection is closed, or gets closed
    ///   before the reply is complete
    /// - [`Error::Protocol`] if the reply is malformed; the connection
    ///   stays usable. Bytes of the bad reply that are already buffered
    ///   are discarded before the next command is written, but bytes
    ///   still in transit at that point are read as the next reply.
    pub async fn execute(&self, command: &str) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        self.execute_with(command, |value| values.push(value)).await?;
        Ok(values)
    }

    /// Executes a command, passing each leaf value to `sink` as soon as it
    /// is decoded.
    ///
    /// Cancellation and errors behave as for [`execute`](Connection::execute).
    #[instrument(skip(self, sink), level = "debug")]
    pub async fn execute_with<F>(&self, command: &str, mut sink: F) -> Result<()>
    where
        F: FnMut(Value),
    {
        let replies = check_command(command)?;
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let mut closed = self.inner.closed.subscribe();
        let mut guard = tokio::select! {
            guard = self.inner.io.lock() => guard,
            _ = wait_closed(&mut closed) => return Err(Error::Closed),
        };

        if guard.is_none() || !self.acquire() {
            guard.take();
            return Err(Error::Closed);
        }
        let mut in_flight = InFlight {
            conn: self,
            guard,
            finished: false,
        };

        let outcome = match in_flight.guard.as_mut() {
            Some(io) => tokio::select! {
                res = drive(io, command, replies, &mut sink) => res,
                _ = wait_closed(&mut closed) => Err(Error::Closed),
            },
            None => Err(Error::Closed),
        };

        in_flight.finish(&outcome);
        self.reclaim_transport();
        outcome
    }

    /// Spawns the command on the runtime and returns immediately.
    ///
    /// Values are handed to `sink` as they are decoded; the returned handle
    /// resolves once the reply is complete. Aborting the handle while the
    /// command is in flight closes the connection.
    ///
    /// # Errors
    ///
    /// Fails without spawning if the command is blank or the connection is
    /// already closed.
    pub fn emit<F>(&self, command: impl Into<String>, sink: F) -> Result<JoinHandle<Result<()>>>
    where
        F: FnMut(Value) + Send + 'static,
    {
        let command = command.into();
        check_command(&command)?;
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let conn = self.clone();
        Ok(tokio::spawn(async move {
            conn.execute_with(&command, sink).await
        }))
    }

    /// Executes a command, blocking the current thread until the reply is
    /// complete.
    ///
    /// The I/O is still driven by the runtime the connection was created
    /// on. Call this from a thread outside the async context, such as one
    /// started with `tokio::task::spawn_blocking`; calling it from inside
    /// an async task panics.
    pub fn execute_blocking(&self, command: &str) -> Result<Vec<Value>> {
        let handle = match &self.inner.runtime {
            Some(handle) => handle.clone(),
            None => tokio::runtime::Handle::try_current().map_err(|_| Error::InvalidArgument {
                message: "no tokio runtime available".to_string(),
            })?,
        };
        handle.block_on(self.execute(command))
    }
}

async fn drive<F>(io: &mut Io, command: &str, replies: usize, sink: &mut F) -> Result<()>
where
    F: FnMut(Value),
{
    if io.stale {
        let discarded = io.transport.discard_ready().await?;
        if discarded > 0 {
            debug!(discarded, "dropped leftover reply bytes");
        }
        io.stale = false;
    }
    io.decoder.reset(replies);
    io.transport.write_line(command).await?;
    debug!(replies, "command written");

    loop {
        match io.decoder.decode()? {
            Decoded::Value(value) => sink(value),
            Decoded::Finished => return Ok(()),
            Decoded::Incomplete => {
                let chunk = io.transport.read_chunk().await?;
                if chunk.is_empty() {
                    return Err(Error::Closed);
                }
                io.decoder.append(chunk);
            }
        }
    }
}
