//! # Redlink Proto
//!
//! RESP (Redis Serialization Protocol) reply decoding.
//!
//! ## Modules
//!
//! - [`codec`] - Resumable reply decoder
//! - [`error`] - Error types shared by the whole crate
//! - [`frame`] - Reply tokens and decoded values

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;
