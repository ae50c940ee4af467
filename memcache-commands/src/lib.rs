//! Command layer of an asynchronous Memcache client.
//!
//! Each operation (get, multi-get, set, delete, incr/decr, touch) becomes one
//! [`Command`] that owns its encoded request bytes and the producer half of a
//! single-assignment [`ResultHandle`]. A [`Transport`] writes the request and,
//! once the matching reply has been parsed, hands it back through
//! [`Command::handle`]. The handle then resolves exactly once, with either the
//! decoded value or an [`Error`].
//!
//! Every handle returned by [`MemcacheClient`] is instrumented: a timer is
//! started at submission and a completion observer records success, failure
//! and hit/miss counts into a [`Metrics`] implementation without touching the
//! value the caller receives.
//!
//! All key and value parameters accept `impl AsRef<[u8]>`, so you can pass
//! `&str`, `String`, `&[u8]`, `Vec<u8>`, `Bytes`, etc.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use memcache_commands::{MemcacheClient, MetricsConfig, MetricsRegistry, Transport};
//!
//! async fn example<T>(transport: Arc<T>) -> Result<(), memcache_commands::Error>
//! where
//!     T: Transport + 'static,
//! {
//!     let metrics = Arc::new(MetricsRegistry::new(MetricsConfig::default())?);
//!     let client = MemcacheClient::new(transport, metrics.clone());
//!
//!     client.set("hello", "world").await?;
//!     let val = client.get("hello").await?;
//!     assert_eq!(val.unwrap().data.as_ref(), b"world");
//!     assert_eq!(metrics.hits().value(), 1);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod instrumented;
pub mod metrics;
pub mod promise;
pub mod transport;

pub use client::MemcacheClient;
pub use command::{Command, CommandKind, Decode, PendingCommand};
pub use config::{ClientConfig, MetricsConfig};
pub use instrumented::{Lookup, Lookups, Metrics, NoopMetrics, Observer, Outcome, instrument};
pub use metrics::{
    Counter, CounterGroup, MetricsRegistry, OutstandingRequests, OutstandingRequestsGauge, Timer,
    TimerContext, set_thread_shard,
};
pub use promise::{Completer, ResultHandle, result_handle};
pub use transport::Transport;

use std::io;

use bytes::Bytes;

// -- Error -------------------------------------------------------------------

/// Errors delivered through a [`ResultHandle`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection failed, or the command was released without a reply.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server returned an error reply (ERROR, CLIENT_ERROR, SERVER_ERROR).
    #[error("memcache error: {0}")]
    Memcache(String),

    /// The reply is not part of the command kind's reply grammar.
    #[error("unexpected response to {command}: {response}")]
    UnexpectedResponse {
        command: &'static str,
        response: &'static str,
    },

    /// Memcache protocol parse error.
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol_memcache::ParseError),

    /// Socket error on the connection the command was sent on. Transports
    /// fail every queued command with it when a read or write fails.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be sent on the wire (empty, too long, or contains
    /// whitespace or control characters).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The value of a storage command exceeds the configured maximum.
    #[error("value is {len} bytes, max is {max}")]
    ValueTooLarge { len: usize, max: usize },

    /// A configuration value was rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true for errors caused by a reply the command could not
    /// interpret, as opposed to transport failures.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::UnexpectedResponse { .. } | Error::Protocol(_))
    }
}

// -- Value types -------------------------------------------------------------

/// A value returned from a GET command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// The cached data.
    pub data: Bytes,
    /// Flags stored with the item.
    pub flags: u32,
    /// CAS unique token (present when the server returns it via `gets`).
    pub cas: Option<u64>,
}

impl From<protocol_memcache::Value> for Value {
    fn from(v: protocol_memcache::Value) -> Self {
        Value {
            data: Bytes::from(v.data),
            flags: v.flags,
            cas: v.cas,
        }
    }
}

/// Status returned by storage, delete and touch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemcacheStatus {
    /// The operation took effect.
    Ok,
    /// The key does not exist.
    KeyNotFound,
    /// The CAS token did not match; the item was modified since it was read.
    KeyExists,
    /// The storage condition (add, replace, append, prepend) was not met.
    ItemNotStored,
}
