use protocol_memcache::{Request, Response};

use super::{CommandKind, Decode, PendingCommand, unexpected};
use crate::promise::ResultHandle;
use crate::{Error, MemcacheStatus};

/// TOUCH: `touch <key> <exptime>\r\n`. Updates an item's expiration.
#[derive(Debug)]
pub struct Touch;

impl Touch {
    /// Build a touch command.
    pub fn command(
        key: impl AsRef<[u8]>,
        exptime: u32,
    ) -> (PendingCommand<Self>, ResultHandle<MemcacheStatus>) {
        PendingCommand::new(Request::touch(key.as_ref(), exptime).to_vec(), Touch)
    }
}

impl Decode for Touch {
    type Output = MemcacheStatus;
    const KIND: CommandKind = CommandKind::Touch;

    fn decode(self, response: Response) -> Result<MemcacheStatus, Error> {
        match response {
            Response::Touched => Ok(MemcacheStatus::Ok),
            Response::NotFound => Ok(MemcacheStatus::KeyNotFound),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::executor::block_on;

    use crate::Command;

    #[test]
    fn touched_and_not_found() {
        let (command, handle) = Touch::command("key", 1);
        assert_eq!(command.request().as_ref(), b"touch key 1\r\n");
        Box::new(command).handle(Response::Touched);
        assert_eq!(block_on(handle).unwrap(), MemcacheStatus::Ok);

        let (command, handle) = Touch::command("key", 1);
        Box::new(command).handle(Response::NotFound);
        assert_eq!(block_on(handle).unwrap(), MemcacheStatus::KeyNotFound);
    }

    #[test]
    fn deleted_is_protocol_error() {
        let (command, handle) = Touch::command("key", 1);
        Box::new(command).handle(Response::Deleted);
        assert!(block_on(handle).unwrap_err().is_protocol());
    }
}
