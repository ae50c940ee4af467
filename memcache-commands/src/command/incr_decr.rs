use protocol_memcache::{Request, Response};

use super::{CommandKind, Decode, PendingCommand, unexpected};
use crate::Error;
use crate::promise::ResultHandle;

/// INCR / DECR: `incr <key> <delta>\r\n`, `decr <key> <delta>\r\n`.
///
/// Resolves to the new value, or `None` when the key does not exist.
/// Incrementing a non-numeric value is answered with CLIENT_ERROR and fails
/// the handle.
#[derive(Debug)]
pub struct IncrDecr;

impl IncrDecr {
    /// Build an increment command.
    pub fn incr(
        key: impl AsRef<[u8]>,
        delta: u64,
    ) -> (PendingCommand<Self>, ResultHandle<Option<u64>>) {
        PendingCommand::new(Request::incr(key.as_ref(), delta).to_vec(), IncrDecr)
    }

    /// Build a decrement command. Memcached clamps at zero.
    pub fn decr(
        key: impl AsRef<[u8]>,
        delta: u64,
    ) -> (PendingCommand<Self>, ResultHandle<Option<u64>>) {
        PendingCommand::new(Request::decr(key.as_ref(), delta).to_vec(), IncrDecr)
    }
}

impl Decode for IncrDecr {
    type Output = Option<u64>;
    const KIND: CommandKind = CommandKind::IncrDecr;

    fn decode(self, response: Response) -> Result<Option<u64>, Error> {
        match response {
            Response::Numeric(value) => Ok(Some(value)),
            Response::NotFound => Ok(None),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}
