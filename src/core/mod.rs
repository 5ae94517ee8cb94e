//! # Redlink Core
//!
//! Connection handling for the redlink client.
//!
//! ## Modules
//!
//! - [`connection`] - Shared connection handle and its usage state
//! - [`executor`] - One-command-at-a-time execution over a connection
//! - [`factory`] - URI parsing, connect, TLS and AUTH
//! - [`builder`] - Connection builder
//! - [`command`] - Inline command construction
//! - [`transport`] - Byte streams a connection runs over

pub use crate::proto::error::{Error, Result};

/// Connection builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Shared connection handle.
pub mod connection;
/// Command execution.
pub mod executor;
/// Connection establishment.
pub mod factory;
/// Plaintext and TLS byte streams.
pub mod transport;

cfg_if::cfg_if! {
    if #[cfg(feature = "tls")] {
        mod tls;
    }
}
