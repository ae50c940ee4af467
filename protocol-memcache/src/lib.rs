//! Memcache ASCII protocol codec.
//!
//! This crate is the wire layer of a Memcache client: it encodes typed
//! requests into request bytes and parses server replies back into typed
//! [`Response`]s. It performs no I/O and holds no state.
//!
//! # Example
//!
//! ```
//! use protocol_memcache::{Request, Response};
//!
//! // Encode a DELETE command
//! let request = Request::delete(b"mykey").to_vec();
//! assert_eq!(request, b"delete mykey\r\n");
//!
//! // Parse the reply
//! let (response, consumed) = Response::parse(b"DELETED\r\n").unwrap();
//! assert_eq!(response, Response::Deleted);
//! assert_eq!(consumed, 9);
//! ```
//!
//! Parsing is incremental: a buffer holding a partial reply yields
//! [`ParseError::Incomplete`] and the caller retries once more bytes arrive.

mod error;
mod request;
mod response;

pub use error::ParseError;
pub use request::{NEWLINE, Request, StoreMode, StoreRequest};
pub use response::{MAX_VALUE_DATA_LEN, Response, Value};
