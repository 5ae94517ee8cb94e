use std::fmt;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

const READ_CHUNK_SIZE: usize = 4096;

/// Any byte stream a [`Connection`](crate::Connection) can run over.
///
/// Implemented for every `AsyncRead + AsyncWrite` type, which covers
/// `TcpStream`, TLS streams and in-memory pipes alike.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Exclusive byte-level access to one plaintext or TLS stream.
pub(crate) struct Transport {
    stream: Box<dyn Stream>,
    chunk: Box<[u8]>,
}

impl Transport {
    pub(crate) fn new<S: Stream>(stream: S) -> Self {
        Self {
            stream: Box::new(stream),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Writes one command followed by the CRLF line terminator.
    pub(crate) async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await
    }

    /// Reads whatever is available, returning an empty slice on end of stream.
    pub(crate) async fn read_chunk(&mut self) -> io::Result<&[u8]> {
        let n = self.stream.read(&mut self.chunk).await?;
        Ok(&self.chunk[..n])
    }

    /// Throws away bytes that are readable right now, without waiting for
    /// more. Returns how many were dropped.
    pub(crate) async fn discard_ready(&mut self) -> io::Result<usize> {
        let mut discarded = 0;
        loop {
            let stream = &mut self.stream;
            let chunk = &mut self.chunk;
            let ready = poll_fn(|cx| {
                let mut buf = ReadBuf::new(&mut chunk[..]);
                match Pin::new(&mut *stream).poll_read(cx, &mut buf) {
                    Poll::Ready(Ok(())) => Poll::Ready(Some(Ok(buf.filled().len()))),
                    Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
                    Poll::Pending => Poll::Ready(None),
                }
            })
            .await;
            match ready {
                None => return Ok(discarded),
                Some(Ok(0)) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Some(Ok(n)) => discarded += n,
                Some(Err(e)) => return Err(e),
            }
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
