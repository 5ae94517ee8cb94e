use bytes::{Buf, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::{Token, Value};

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default

/// Outcome of one [`Decoder::decode`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A leaf value, in the order the server sent it.
    Value(Value),
    /// The buffered bytes end mid-frame; append more input and call again.
    Incomplete,
    /// Every expected top-level reply has been consumed.
    Finished,
}

/// A resumable RESP reply decoder.
///
/// The decoder is primed with the number of top-level replies a command is
/// expected to produce, then fed bytes as they arrive. Each call to
/// [`decode`](Decoder::decode) yields at most one leaf value. Array nesting
/// is tracked with an explicit stack of remaining-element counters, so deep
/// or long arrays never grow the call stack and decoding can stop and
/// resume at any byte boundary.
///
/// # Example
///
/// ```
/// use redlink::proto::codec::{Decoded, Decoder};
/// use redlink::proto::frame::Value;
///
/// let mut decoder = Decoder::new();
/// decoder.reset(1);
/// decoder.append(b"*2\r\n:1\r\n$-1\r\n");
/// assert_eq!(decoder.decode().unwrap(), Decoded::Value(Value::Integer(1)));
/// assert_eq!(decoder.decode().unwrap(), Decoded::Value(Value::Nil));
/// assert_eq!(decoder.decode().unwrap(), Decoded::Finished);
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    /// Remaining elements of each open array, innermost last.
    depth: Vec<usize>,
    /// Payload length of a bulk string whose header was already consumed.
    bulk: Option<usize>,
    /// Top-level replies still expected.
    pending: usize,
    max_frame_size: usize,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer and nothing pending.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    ///
    /// # Arguments
    ///
    /// * `max_frame_size` - Maximum size in bytes for a single frame
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            depth: Vec::new(),
            bulk: None,
            pending: 0,
            max_frame_size,
        }
    }

    /// Discards all buffered input and parse state, then expects `replies`
    /// top-level replies.
    pub fn reset(&mut self, replies: usize) {
        self.buf.clear();
        self.depth.clear();
        self.bulk = None;
        self.pending = replies;
    }

    /// Appends raw bytes received from the transport.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns true when no reply is pending.
    pub fn is_finished(&self) -> bool {
        self.pending == 0
    }

    /// Advances the decoder by at most one leaf value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on malformed input. The decoder should be
    /// [`reset`](Decoder::reset) before it is used again.
    pub fn decode(&mut self) -> Result<Decoded> {
        loop {
            if self.pending == 0 {
                return Ok(Decoded::Finished);
            }

            if let Some(len) = self.bulk {
                if self.buf.len() < len + 2 {
                    return Ok(Decoded::Incomplete);
                }
                if &self.buf[len..len + 2] != b"\r\n" {
                    return Err(Error::protocol("bulk string not terminated by CRLF"));
                }
                let data = self.buf.split_to(len).freeze();
                self.buf.advance(2);
                self.bulk = None;
                self.element_done();
                return Ok(Decoded::Value(Value::Bulk(data)));
            }

            let line = match split_line(&mut self.buf) {
                Some(line) => line,
                None => {
                    if self.buf.len() > self.max_frame_size {
                        return Err(Error::protocol("Buffer size exceeded maximum frame size"));
                    }
                    return Ok(Decoded::Incomplete);
                }
            };

            // Servers may pad between frames with bare CRLF.
            if line.is_empty() {
                continue;
            }

            match Token::parse(&line)? {
                Token::SimpleString(s) => return Ok(self.leaf(Value::Status(s))),
                Token::Error(e) => return Ok(self.leaf(Value::Error(e))),
                Token::Integer(i) => return Ok(self.leaf(Value::Integer(i))),
                Token::BulkString(None) | Token::ArrayHeader(None) => {
                    return Ok(self.leaf(Value::Nil))
                }
                Token::BulkString(Some(len)) => {
                    if len > self.max_frame_size {
                        return Err(Error::protocol(
                            "Bulk string length exceeds maximum frame size",
                        ));
                    }
                    self.bulk = Some(len);
                }
                Token::ArrayHeader(Some(0)) => self.element_done(),
                Token::ArrayHeader(Some(count)) => self.depth.push(count),
            }
        }
    }

    fn leaf(&mut self, value: Value) -> Decoded {
        self.element_done();
        Decoded::Value(value)
    }

    /// Accounts for one fully decoded element, closing every array it completes.
    fn element_done(&mut self) {
        while let Some(remaining) = self.depth.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return;
            }
            self.depth.pop();
        }
        self.pending = self.pending.saturating_sub(1);
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes and returns the next CRLF-terminated line from `buf`, without
/// its terminator.
///
/// Returns `None` and leaves `buf` untouched when no complete line is
/// buffered yet.
pub fn split_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let end = buf.windows(2).position(|w| w == b"\r\n")?;
    let line = buf.split_to(end);
    buf.advance(2);
    Some(line)
}
