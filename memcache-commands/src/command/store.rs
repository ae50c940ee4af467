use protocol_memcache::{Request, Response, StoreMode};

use super::{CommandKind, Decode, PendingCommand, unexpected};
use crate::promise::ResultHandle;
use crate::{Error, MemcacheStatus};

/// Storage commands: set, add, replace, append, prepend and cas.
///
/// All are accounted as `set`. `STORED` resolves to [`MemcacheStatus::Ok`].
/// The conditional verbs answer `NOT_STORED` when their condition fails;
/// cas answers `EXISTS` on a token mismatch and `NOT_FOUND` when the item is
/// gone.
#[derive(Debug)]
pub struct Store {
    cas: bool,
}

impl Store {
    /// Build a storage command.
    pub fn command(
        mode: StoreMode,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        flags: u32,
        exptime: u32,
    ) -> (PendingCommand<Self>, ResultHandle<MemcacheStatus>) {
        let request = Request::Store {
            mode,
            key: key.as_ref(),
            value: value.as_ref(),
            flags,
            exptime,
        };
        PendingCommand::new(request.to_vec(), Store { cas: false })
    }

    /// Build a compare-and-swap command.
    pub fn command_cas(
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        flags: u32,
        exptime: u32,
        cas_unique: u64,
    ) -> (PendingCommand<Self>, ResultHandle<MemcacheStatus>) {
        let request = Request::Cas {
            key: key.as_ref(),
            value: value.as_ref(),
            flags,
            exptime,
            cas_unique,
        };
        PendingCommand::new(request.to_vec(), Store { cas: true })
    }
}

impl Decode for Store {
    type Output = MemcacheStatus;
    const KIND: CommandKind = CommandKind::Set;

    fn decode(self, response: Response) -> Result<MemcacheStatus, Error> {
        match (response, self.cas) {
            (Response::Stored, _) => Ok(MemcacheStatus::Ok),
            (Response::NotStored, false) => Ok(MemcacheStatus::ItemNotStored),
            (Response::Exists, true) => Ok(MemcacheStatus::KeyExists),
            (Response::NotFound, true) => Ok(MemcacheStatus::KeyNotFound),
            (other, _) => Err(unexpected(Self::KIND, &other)),
        }
    }
}
