use protocol_memcache::{Request, Response};

use super::{CommandKind, Decode, PendingCommand, unexpected};
use crate::promise::ResultHandle;
use crate::{Error, MemcacheStatus};

/// DELETE: `delete <key>\r\n`.
///
/// `DELETED` resolves to [`MemcacheStatus::Ok`], `NOT_FOUND` to
/// [`MemcacheStatus::KeyNotFound`]. Anything else is a protocol error.
#[derive(Debug)]
pub struct Delete;

impl Delete {
    /// Build a delete command for `key`.
    pub fn command(key: impl AsRef<[u8]>) -> (PendingCommand<Self>, ResultHandle<MemcacheStatus>) {
        PendingCommand::new(Request::delete(key.as_ref()).to_vec(), Delete)
    }
}

impl Decode for Delete {
    type Output = MemcacheStatus;
    const KIND: CommandKind = CommandKind::Delete;

    fn decode(self, response: Response) -> Result<MemcacheStatus, Error> {
        match response {
            Response::Deleted => Ok(MemcacheStatus::Ok),
            Response::NotFound => Ok(MemcacheStatus::KeyNotFound),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}
