//! Client facade: builds a command per call, instruments its handle and
//! submits it to the transport.

use std::sync::Arc;

use protocol_memcache::StoreMode;
use tracing::trace;

use crate::command::{
    Command, CommandKind, Decode, Delete, Get, IncrDecr, MultiGet, PendingCommand, Store, Touch,
};
use crate::config::ClientConfig;
use crate::instrumented::{Lookups, Metrics, instrument};
use crate::promise::ResultHandle;
use crate::transport::Transport;
use crate::{Error, MemcacheStatus, Value};

/// Memcache client over a pipelined [`Transport`].
///
/// Every method returns immediately with a [`ResultHandle`]; nothing here
/// blocks or awaits. Each handle is accounted exactly once in the client's
/// [`Metrics`], including calls rejected before reaching the transport.
pub struct MemcacheClient<T: Transport> {
    transport: Arc<T>,
    metrics: Arc<dyn Metrics>,
    config: ClientConfig,
}

impl<T: Transport> Clone for MemcacheClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            metrics: self.metrics.clone(),
            config: self.config,
        }
    }
}

impl<T: Transport + 'static> MemcacheClient<T> {
    /// Create a client with the default configuration.
    ///
    /// The transport is registered as the metrics' outstanding-requests
    /// provider.
    pub fn new(transport: Arc<T>, metrics: Arc<dyn Metrics>) -> Self {
        Self::with_config(transport, metrics, ClientConfig::default())
    }

    /// Create a client with a custom configuration.
    pub fn with_config(
        transport: Arc<T>,
        metrics: Arc<dyn Metrics>,
        config: ClientConfig,
    ) -> Self {
        metrics.register_outstanding_requests_gauge(transport.clone());
        Self {
            transport,
            metrics,
            config,
        }
    }
}

impl<T: Transport> MemcacheClient<T> {
    /// Returns the underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -- Commands -------------------------------------------------------------

    /// Get the value of a key. Resolves to `None` on cache miss.
    pub fn get(&self, key: impl AsRef<[u8]>) -> ResultHandle<Option<Value>> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(Get::command(key)),
            Err(e) => self.reject(CommandKind::Get, e),
        }
    }

    /// Get the value of a key together with its CAS token.
    pub fn gets(&self, key: impl AsRef<[u8]>) -> ResultHandle<Option<Value>> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(Get::command_with_cas(key)),
            Err(e) => self.reject(CommandKind::Get, e),
        }
    }

    /// Get several keys in one request. Resolves to one slot per key, in the
    /// order given, `None` for misses.
    pub fn get_multi<I>(&self, keys: I) -> ResultHandle<Vec<Option<Value>>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let keys: Vec<I::Item> = keys.into_iter().collect();
        if keys.is_empty() {
            let handle = ResultHandle::ready(Ok(Vec::new()));
            instrument(&*self.metrics, CommandKind::MultiGet, &handle);
            return handle;
        }
        if keys.len() > self.config.max_keys {
            let error = Error::InvalidKey(format!(
                "{} keys exceed the multi-get limit of {}",
                keys.len(),
                self.config.max_keys
            ));
            return self.reject(CommandKind::MultiGet, error);
        }
        if let Err(e) = keys.iter().try_for_each(|k| self.check_key(k.as_ref())) {
            return self.reject(CommandKind::MultiGet, e);
        }
        self.submit(MultiGet::command(keys))
    }

    /// Set a key-value pair with default flags (0) and no expiration.
    pub fn set(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Set, key, value, 0, 0)
    }

    /// Set a key-value pair with custom flags and expiration time.
    pub fn set_with_options(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        flags: u32,
        exptime: u32,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Set, key, value, flags, exptime)
    }

    /// Store a key only if it does not already exist.
    /// Resolves to `ItemNotStored` if the key exists.
    pub fn add(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Add, key, value, 0, 0)
    }

    /// Store a key only if it already exists.
    /// Resolves to `ItemNotStored` if the key does not exist.
    pub fn replace(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Replace, key, value, 0, 0)
    }

    /// Append data to an existing item's value.
    pub fn append(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Append, key, value, 0, 0)
    }

    /// Prepend data to an existing item's value.
    pub fn prepend(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ResultHandle<MemcacheStatus> {
        self.store(StoreMode::Prepend, key, value, 0, 0)
    }

    /// Any storage command, with explicit flags and expiration. Values larger
    /// than [`ClientConfig::max_value_len`] fail with
    /// [`Error::ValueTooLarge`] without being sent.
    pub fn store(
        &self,
        mode: StoreMode,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        flags: u32,
        exptime: u32,
    ) -> ResultHandle<MemcacheStatus> {
        let (key, value) = (key.as_ref(), value.as_ref());
        match self.check_key(key).and_then(|()| self.check_value(value)) {
            Ok(()) => self.submit(Store::command(mode, key, value, flags, exptime)),
            Err(e) => self.reject(CommandKind::Set, e),
        }
    }

    /// Compare-and-swap: store the value only if the CAS token matches.
    /// Resolves to `KeyExists` on a token mismatch and `KeyNotFound` if the
    /// item is gone.
    pub fn cas(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        cas_unique: u64,
    ) -> ResultHandle<MemcacheStatus> {
        let (key, value) = (key.as_ref(), value.as_ref());
        match self.check_key(key).and_then(|()| self.check_value(value)) {
            Ok(()) => self.submit(Store::command_cas(key, value, 0, 0, cas_unique)),
            Err(e) => self.reject(CommandKind::Set, e),
        }
    }

    /// Delete a key.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> ResultHandle<MemcacheStatus> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(Delete::command(key)),
            Err(e) => self.reject(CommandKind::Delete, e),
        }
    }

    /// Increment a numeric value by delta. Resolves to the new value, or
    /// `None` if the key does not exist.
    pub fn incr(&self, key: impl AsRef<[u8]>, delta: u64) -> ResultHandle<Option<u64>> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(IncrDecr::incr(key, delta)),
            Err(e) => self.reject(CommandKind::IncrDecr, e),
        }
    }

    /// Decrement a numeric value by delta. Resolves to the new value, or
    /// `None` if the key does not exist.
    pub fn decr(&self, key: impl AsRef<[u8]>, delta: u64) -> ResultHandle<Option<u64>> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(IncrDecr::decr(key, delta)),
            Err(e) => self.reject(CommandKind::IncrDecr, e),
        }
    }

    /// Update the expiration time of a key.
    pub fn touch(&self, key: impl AsRef<[u8]>, exptime: u32) -> ResultHandle<MemcacheStatus> {
        let key = key.as_ref();
        match self.check_key(key) {
            Ok(()) => self.submit(Touch::command(key, exptime)),
            Err(e) => self.reject(CommandKind::Touch, e),
        }
    }

    // -- Internals ------------------------------------------------------------

    fn submit<D>(
        &self,
        (command, handle): (PendingCommand<D>, ResultHandle<D::Output>),
    ) -> ResultHandle<D::Output>
    where
        D: Decode,
        D::Output: Lookups,
    {
        instrument(&*self.metrics, D::KIND, &handle);
        trace!(
            command = D::KIND.name(),
            bytes = command.request().len(),
            "submitting command"
        );
        self.transport.send(Box::new(command));
        handle
    }

    fn reject<O>(&self, kind: CommandKind, error: Error) -> ResultHandle<O>
    where
        O: Lookups + Send + 'static,
    {
        trace!(command = kind.name(), error = %error, "command rejected");
        let handle = ResultHandle::ready(Err(error));
        instrument(&*self.metrics, kind, &handle);
        handle
    }

    fn check_key(&self, key: &[u8]) -> Result<(), Error> {
        if !self.config.validate_keys {
            return Ok(());
        }
        if key.is_empty() {
            return Err(Error::InvalidKey("key is empty".into()));
        }
        if key.len() > self.config.max_key_len {
            return Err(Error::InvalidKey(format!(
                "key is {} bytes, max is {}",
                key.len(),
                self.config.max_key_len
            )));
        }
        if key.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(Error::InvalidKey(format!(
                "key contains whitespace or control characters: {:?}",
                String::from_utf8_lossy(key)
            )));
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<(), Error> {
        if value.len() > self.config.max_value_len {
            return Err(Error::ValueTooLarge {
                len: value.len(),
                max: self.config.max_value_len,
            });
        }
        Ok(())
    }
}
