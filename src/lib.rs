//! # Redlink
//!
//! Async Redis client library for Rust built around a resumable RESP reply
//! decoder. Each connection runs one command at a time; concurrent callers
//! are queued and served in order.
//!
//! ## Features
//!
//! - `tls` - TLS support through rustls (enabled by default)
//!
//! ## Example
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = redlink::connect("redis://localhost:6379").await?;
//!     let replies = conn
//!         .execute("MULTI\nDEL FOO\nLPUSH FOO 1\nLPUSH FOO 2\nEXEC")
//!         .await?;
//!     for reply in replies {
//!         println!("{}", reply);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub mod proto;

pub use crate::core::builder::ClientBuilder;
pub use crate::core::command::Cmd;
pub use crate::core::connection::{Connection, ConnectionState};
pub use crate::core::factory::{connect, connect_blocking, ConnectInfo, Credentials};
pub use crate::core::transport::Stream;
pub use crate::core::{Error, Result};
pub use crate::proto::frame::Value;
