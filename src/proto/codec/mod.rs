//! Reply decoding.
//!
//! The [`Decoder`] is sans-IO: the caller feeds it transport bytes and pulls
//! decoded [`Value`](crate::proto::frame::Value)s out of it.

mod decoder;

pub use decoder::{split_line, Decoded, Decoder};
