use std::collections::HashMap;

use bytes::Bytes;
use protocol_memcache::{Request, Response};

use super::{CommandKind, Decode, PendingCommand, unexpected};
use crate::promise::ResultHandle;
use crate::{Error, Value};

/// Single-key GET (`get <key>`) or GETS (`gets <key>`, value carries a CAS token).
///
/// An empty reply (`END`) is a miss. A value for any other key, or more than
/// one value, is a protocol error.
#[derive(Debug)]
pub struct Get {
    key: Bytes,
}

impl Get {
    /// Build a get command for `key`.
    pub fn command(key: impl AsRef<[u8]>) -> (PendingCommand<Self>, ResultHandle<Option<Value>>) {
        let key = Bytes::copy_from_slice(key.as_ref());
        let request = Request::get(&key).to_vec();
        PendingCommand::new(request, Get { key })
    }

    /// Build a gets command for `key`.
    pub fn command_with_cas(
        key: impl AsRef<[u8]>,
    ) -> (PendingCommand<Self>, ResultHandle<Option<Value>>) {
        let key = Bytes::copy_from_slice(key.as_ref());
        let keys: [&[u8]; 1] = [&key];
        let request = Request::gets(&keys).to_vec();
        PendingCommand::new(request, Get { key })
    }
}

impl Decode for Get {
    type Output = Option<Value>;
    const KIND: CommandKind = CommandKind::Get;

    fn decode(self, response: Response) -> Result<Option<Value>, Error> {
        let Response::Values(mut values) = response else {
            return Err(unexpected(Self::KIND, &response));
        };
        match values.len() {
            0 => Ok(None),
            1 if values[0].key == self.key => Ok(Some(values.swap_remove(0).into())),
            _ => Err(unexpected(Self::KIND, &Response::Values(values))),
        }
    }
}

/// Multi-key GET: `get <key1> <key2> ...`.
///
/// The server replies with one value per hit, in any order, followed by END.
/// The result has one slot per requested key, in request order, with `None`
/// for every key that got no value. A key requested twice fills both slots.
#[derive(Debug)]
pub struct MultiGet {
    keys: Vec<Bytes>,
}

impl MultiGet {
    /// Build a multi-get command for `keys`.
    pub fn command<I>(keys: I) -> (PendingCommand<Self>, ResultHandle<Vec<Option<Value>>>)
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let keys: Vec<Bytes> = keys
            .into_iter()
            .map(|k| Bytes::copy_from_slice(k.as_ref()))
            .collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_ref()).collect();
        let request = Request::get_multi(&refs).to_vec();
        PendingCommand::new(request, MultiGet { keys })
    }

    /// The requested keys, in order.
    pub fn keys(&self) -> &[Bytes] {
        &self.keys
    }
}

impl Decode for MultiGet {
    type Output = Vec<Option<Value>>;
    const KIND: CommandKind = CommandKind::MultiGet;

    fn decode(self, response: Response) -> Result<Vec<Option<Value>>, Error> {
        let Response::Values(values) = response else {
            return Err(unexpected(Self::KIND, &response));
        };

        let mut found: HashMap<&[u8], Option<Value>> =
            self.keys.iter().map(|k| (k.as_ref(), None)).collect();
        for value in values {
            match found.get_mut(value.key.as_slice()) {
                Some(slot) => *slot = Some(value.into()),
                None => return Err(unexpected(Self::KIND, &Response::Values(vec![value]))),
            }
        }

        Ok(self
            .keys
            .iter()
            .map(|k| found.get(k.as_ref()).cloned().flatten())
            .collect())
    }
}
