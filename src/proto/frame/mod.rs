//! RESP reply types.
//!
//! [`Token`] is one header line as it appears on the wire, [`Value`] is a
//! decoded leaf handed to the caller.

/// Token and value definitions.
pub mod types;

pub use types::{Token, Value};
