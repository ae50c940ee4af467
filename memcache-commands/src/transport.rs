use crate::command::Command;
use crate::metrics::OutstandingRequests;

/// The connection layer commands are submitted to.
///
/// A transport writes each command's [`request`](Command::request) to a
/// connection and keeps the command in a per-connection FIFO queue. Replies
/// are matched strictly in order: the next parsed reply belongs to the
/// oldest unanswered command on that connection, which receives it through
/// [`Command::handle`]. When the connection fails, every queued command is
/// finished with [`Command::fail`].
///
/// Each submitted command must be finished at most once. A command that is
/// dropped without being finished fails its handle with
/// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
///
/// The [`OutstandingRequests`] supertrait reports how many submitted
/// commands have not been finished yet.
pub trait Transport: OutstandingRequests {
    /// Submit a command. Must not block.
    fn send(&self, command: Box<dyn Command>);
}
