//! Per-operation commands.
//!
//! A command is created on the caller's thread with its request already
//! encoded, handed to the [`Transport`](crate::Transport), and finished on
//! the transport's I/O context by exactly one call to [`Command::handle`]
//! (a matched reply) or [`Command::fail`] (the connection went away). Both
//! take `self: Box<Self>`, so a command cannot be finished twice.
//!
//! Each kind supplies a [`Decode`] implementation that maps the replies in
//! its grammar to a typed result. Error replies (`ERROR`, `CLIENT_ERROR`,
//! `SERVER_ERROR`) fail every kind with [`Error::Memcache`]; any other reply
//! outside the grammar fails with [`Error::UnexpectedResponse`]. Nothing is
//! retried at this layer.

mod delete;
mod get;
mod incr_decr;
mod store;
mod touch;

pub use delete::Delete;
pub use get::{Get, MultiGet};
pub use incr_decr::IncrDecr;
pub use store::Store;
pub use touch::Touch;

use bytes::Bytes;
use protocol_memcache::Response;
use tracing::{debug, trace};

use crate::Error;
use crate::promise::{Completer, ResultHandle, result_handle};

/// The operation families that are timed and counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Get,
    MultiGet,
    Set,
    Delete,
    IncrDecr,
    Touch,
}

impl CommandKind {
    /// Every kind, in metric registration order.
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Get,
        CommandKind::MultiGet,
        CommandKind::Set,
        CommandKind::Delete,
        CommandKind::IncrDecr,
        CommandKind::Touch,
    ];

    /// The operation segment used in metric names.
    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::Get => "get",
            CommandKind::MultiGet => "multiget",
            CommandKind::Set => "set",
            CommandKind::Delete => "delete",
            CommandKind::IncrDecr => "incrdecr",
            CommandKind::Touch => "touch",
        }
    }

    /// Position in [`CommandKind::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// An in-flight operation, as seen by the transport.
pub trait Command: Send {
    /// The kind of operation.
    fn kind(&self) -> CommandKind;

    /// The encoded request. Never changes once the command is built.
    fn request(&self) -> &Bytes;

    /// Deliver the reply matched to this command.
    fn handle(self: Box<Self>, response: Response);

    /// Fail the command without a reply (connection loss, write error).
    fn fail(self: Box<Self>, error: Error);
}

/// Reply grammar of one command kind.
pub trait Decode: Send + 'static {
    /// The value the caller's handle resolves to.
    type Output: Send + 'static;

    /// The kind this decoder belongs to.
    const KIND: CommandKind;

    /// Map a non-error reply to a result.
    fn decode(self, response: Response) -> Result<Self::Output, Error>;
}

/// A command built from an encoded request and its kind's decoder.
pub struct PendingCommand<D: Decode> {
    request: Bytes,
    decoder: D,
    completer: Completer<D::Output>,
}

impl<D: Decode> PendingCommand<D> {
    /// Build a command and the handle its result will be delivered to.
    pub fn new(request: impl Into<Bytes>, decoder: D) -> (Self, ResultHandle<D::Output>) {
        let (completer, handle) = result_handle();
        let command = Self {
            request: request.into(),
            decoder,
            completer,
        };
        (command, handle)
    }
}

impl<D: Decode> Command for PendingCommand<D> {
    fn kind(&self) -> CommandKind {
        D::KIND
    }

    fn request(&self) -> &Bytes {
        &self.request
    }

    fn handle(self: Box<Self>, response: Response) {
        let PendingCommand {
            decoder, completer, ..
        } = *self;
        let result = check_error(&response).and_then(|()| decoder.decode(response));
        match &result {
            Ok(_) => trace!(command = D::KIND.name(), "command completed"),
            Err(e) if e.is_protocol() => {
                debug!(command = D::KIND.name(), error = %e, "protocol error")
            }
            Err(e) => trace!(command = D::KIND.name(), error = %e, "command failed"),
        }
        completer.complete(result);
    }

    fn fail(self: Box<Self>, error: Error) {
        trace!(command = D::KIND.name(), error = %error, "command failed");
        self.completer.fail(error);
    }
}

/// Check a reply for error variants and return an appropriate `Error`.
pub(crate) fn check_error(response: &Response) -> Result<(), Error> {
    match response {
        Response::Error => Err(Error::Memcache("ERROR".into())),
        Response::ClientError(msg) => Err(Error::Memcache(format!(
            "CLIENT_ERROR {}",
            String::from_utf8_lossy(msg)
        ))),
        Response::ServerError(msg) => Err(Error::Memcache(format!(
            "SERVER_ERROR {}",
            String::from_utf8_lossy(msg)
        ))),
        _ => Ok(()),
    }
}

/// The error for a reply outside a kind's grammar.
pub(crate) fn unexpected(kind: CommandKind, response: &Response) -> Error {
    Error::UnexpectedResponse {
        command: kind.name(),
        response: response.token(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::executor::block_on;

    use crate::MemcacheStatus;

    #[test]
    fn kind_names_and_indices() {
        let names: Vec<_> = CommandKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            ["get", "multiget", "set", "delete", "incrdecr", "touch"]
        );
        for (i, kind) in CommandKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn error_replies_fail_every_kind() {
        let replies = [
            (Response::Error, "memcache error: ERROR"),
            (
                Response::ClientError(b"bad command line format".to_vec()),
                "memcache error: CLIENT_ERROR bad command line format",
            ),
            (
                Response::ServerError(b"out of memory".to_vec()),
                "memcache error: SERVER_ERROR out of memory",
            ),
        ];
        for (reply, message) in replies {
            let (command, handle) = Delete::command(b"k");
            Box::new(command).handle(reply);
            let err = block_on(handle).unwrap_err();
            assert!(!err.is_protocol());
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn fail_surfaces_transport_error() {
        let (command, handle) = Delete::command(b"k");
        let command: Box<dyn Command> = Box::new(command);
        command.fail(Error::ConnectionClosed);
        assert!(matches!(block_on(handle), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn dropped_command_fails_handle() {
        let (command, handle) = Delete::command(b"k");
        drop(command);
        assert!(matches!(block_on(handle), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn request_is_encoded_at_construction() {
        let (command, handle) = Delete::command(b"k");
        assert_eq!(command.kind(), CommandKind::Delete);
        assert_eq!(command.request().as_ref(), b"delete k\r\n");
        Box::new(command).handle(Response::Deleted);
        assert_eq!(block_on(handle).unwrap(), MemcacheStatus::Ok);
    }
}
