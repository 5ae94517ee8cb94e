use std::fmt;

use bytes::Bytes;

use crate::proto::error::{Error, Result};

/// One RESP header line, classified by its type prefix.
///
/// A token is what a single CRLF-terminated line announces:
/// - SimpleString: status replies like "OK"
/// - Error: error replies from the server
/// - Integer: numeric replies
/// - BulkString: the announced payload length of a bulk string, `None` for nil
/// - ArrayHeader: the announced element count of an array, `None` for nil
///
/// Bulk payloads and array elements follow the header on the wire and are
/// read by the decoder, not by the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Simple string (+OK).
    SimpleString(String),
    /// Error (-ERR).
    Error(String),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string header ($6).
    BulkString(Option<usize>),
    /// Array header (*2).
    ArrayHeader(Option<usize>),
}

impl Token {
    /// Parses a header line with its CRLF already stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an unknown prefix, an empty line, or a
    /// length / integer that is not a number.
    pub fn parse(line: &[u8]) -> Result<Token> {
        let (prefix, rest) = match line.split_first() {
            Some(split) => split,
            None => return Err(Error::protocol("empty reply line")),
        };

        match prefix {
            b'+' => Ok(Token::SimpleString(String::from_utf8_lossy(rest).into_owned())),
            b'-' => Ok(Token::Error(String::from_utf8_lossy(rest).into_owned())),
            b':' => parse_int(rest).map(Token::Integer),
            b'$' => parse_len(rest).map(Token::BulkString),
            b'*' => parse_len(rest).map(Token::ArrayHeader),
            other => Err(Error::protocol(format!(
                "unknown reply prefix {:?}",
                *other as char
            ))),
        }
    }
}

fn parse_int(digits: &[u8]) -> Result<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            Error::protocol(format!(
                "invalid integer {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}

/// Negative lengths are the nil sentinel.
fn parse_len(digits: &[u8]) -> Result<Option<usize>> {
    let n = parse_int(digits)?;
    if n < 0 {
        return Ok(None);
    }
    usize::try_from(n)
        .map(Some)
        .map_err(|_| Error::protocol(format!("length {} out of range", n)))
}

/// A decoded leaf of a reply.
///
/// Arrays are flattened depth-first, so a command result is a plain
/// `Vec<Value>`. Nil bulk strings and nil arrays both surface as
/// [`Value::Nil`]; empty bulk strings surface as an empty [`Value::Bulk`]
/// and empty arrays contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Status reply (+OK).
    Status(String),
    /// Error reply (-ERR ...).
    Error(String),
    /// Integer reply.
    Integer(i64),
    /// Bulk string payload.
    Bulk(Bytes),
    /// Nil bulk string or nil array.
    Nil,
}

impl Value {
    /// Returns true if this value is [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the error message if this is an error reply.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Value::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the raw bytes of a bulk or status reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bulk(b) => Some(b),
            Value::Status(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer reply.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts an error reply into [`Error::Server`], passing other values through.
    pub fn into_result(self) -> Result<Value> {
        match self {
            Value::Error(message) => Err(Error::Server { message }),
            other => Ok(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Status(s) | Value::Error(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Bulk(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Nil => f.write_str("(nil)"),
        }
    }
}
