//! Client-side request encoding for the Memcache ASCII protocol.
//!
//! Every request is a single line of space-separated tokens terminated by
//! `\r\n`, optionally followed by a data block for storage commands. Keys are
//! copied byte-for-byte; they are not escaped or validated here.

/// Line terminator used by every request and reply.
pub const NEWLINE: &[u8] = b"\r\n";

/// Maximum number of ASCII digits in a `u64`.
const MAX_DIGITS: usize = 20;

/// The verb used by a storage request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Store unconditionally.
    Set,
    /// Store only if the key does not already exist.
    Add,
    /// Store only if the key already exists.
    Replace,
    /// Append data to an existing item's value.
    Append,
    /// Prepend data to an existing item's value.
    Prepend,
}

impl StoreMode {
    /// The command verb on the wire.
    #[inline]
    pub fn verb(self) -> &'static [u8] {
        match self {
            StoreMode::Set => b"set",
            StoreMode::Add => b"add",
            StoreMode::Replace => b"replace",
            StoreMode::Append => b"append",
            StoreMode::Prepend => b"prepend",
        }
    }
}

/// A request builder for encoding Memcache commands.
#[derive(Debug, Clone)]
pub enum Request<'a> {
    /// GET command: `get <key>\r\n`
    Get { key: &'a [u8] },
    /// Multi-GET command: `get <key1> <key2> ...\r\n`
    GetMulti { keys: &'a [&'a [u8]] },
    /// GETS command (values carry a CAS token): `gets <key1> <key2> ...\r\n`
    Gets { keys: &'a [&'a [u8]] },
    /// Storage command: `<verb> <key> <flags> <exptime> <bytes>\r\n<data>\r\n`
    Store {
        mode: StoreMode,
        key: &'a [u8],
        value: &'a [u8],
        flags: u32,
        exptime: u32,
    },
    /// CAS command: `cas <key> <flags> <exptime> <bytes> <cas_unique>\r\n<data>\r\n`
    Cas {
        key: &'a [u8],
        value: &'a [u8],
        flags: u32,
        exptime: u32,
        cas_unique: u64,
    },
    /// INCR command: `incr <key> <delta>\r\n`
    Incr { key: &'a [u8], delta: u64 },
    /// DECR command: `decr <key> <delta>\r\n`
    Decr { key: &'a [u8], delta: u64 },
    /// DELETE command: `delete <key>\r\n`
    Delete { key: &'a [u8] },
    /// TOUCH command: `touch <key> <exptime>\r\n`
    Touch { key: &'a [u8], exptime: u32 },
}

impl<'a> Request<'a> {
    /// Create a GET request.
    #[inline]
    pub fn get(key: &'a [u8]) -> Self {
        Request::Get { key }
    }

    /// Create a multi-key GET request.
    #[inline]
    pub fn get_multi(keys: &'a [&'a [u8]]) -> Self {
        Request::GetMulti { keys }
    }

    /// Create a GETS request.
    #[inline]
    pub fn gets(keys: &'a [&'a [u8]]) -> Self {
        Request::Gets { keys }
    }

    /// Create a SET request with default flags and no expiration.
    #[inline]
    pub fn set(key: &'a [u8], value: &'a [u8]) -> StoreRequest<'a> {
        StoreRequest::new(StoreMode::Set, key, value)
    }

    /// Create an ADD request (store only if key does not exist).
    #[inline]
    pub fn add(key: &'a [u8], value: &'a [u8]) -> StoreRequest<'a> {
        StoreRequest::new(StoreMode::Add, key, value)
    }

    /// Create a REPLACE request (store only if key already exists).
    #[inline]
    pub fn replace(key: &'a [u8], value: &'a [u8]) -> StoreRequest<'a> {
        StoreRequest::new(StoreMode::Replace, key, value)
    }

    /// Create an APPEND request.
    #[inline]
    pub fn append(key: &'a [u8], value: &'a [u8]) -> Self {
        StoreRequest::new(StoreMode::Append, key, value).build()
    }

    /// Create a PREPEND request.
    #[inline]
    pub fn prepend(key: &'a [u8], value: &'a [u8]) -> Self {
        StoreRequest::new(StoreMode::Prepend, key, value).build()
    }

    /// Create a CAS (compare-and-swap) request.
    #[inline]
    pub fn cas(key: &'a [u8], value: &'a [u8], cas_unique: u64) -> Self {
        Request::Cas {
            key,
            value,
            flags: 0,
            exptime: 0,
            cas_unique,
        }
    }

    /// Create an INCR request.
    #[inline]
    pub fn incr(key: &'a [u8], delta: u64) -> Self {
        Request::Incr { key, delta }
    }

    /// Create a DECR request.
    #[inline]
    pub fn decr(key: &'a [u8], delta: u64) -> Self {
        Request::Decr { key, delta }
    }

    /// Create a DELETE request.
    #[inline]
    pub fn delete(key: &'a [u8]) -> Self {
        Request::Delete { key }
    }

    /// Create a TOUCH request.
    #[inline]
    pub fn touch(key: &'a [u8], exptime: u32) -> Self {
        Request::Touch { key, exptime }
    }

    /// Upper bound on the number of bytes [`encode`](Self::encode) writes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Request::Get { key } => 4 + key.len() + 2,
            Request::GetMulti { keys } | Request::Gets { keys } => {
                4 + keys.iter().map(|k| 1 + k.len()).sum::<usize>() + 2
            }
            Request::Store {
                mode, key, value, ..
            } => mode.verb().len() + key.len() + value.len() + 3 * (1 + MAX_DIGITS) + 5,
            Request::Cas { key, value, .. } => {
                4 + key.len() + value.len() + 4 * (1 + MAX_DIGITS) + 4
            }
            Request::Incr { key, .. } | Request::Decr { key, .. } => {
                5 + key.len() + 1 + MAX_DIGITS + 2
            }
            Request::Delete { key } => 7 + key.len() + 2,
            Request::Touch { key, .. } => 6 + key.len() + 1 + MAX_DIGITS + 2,
        }
    }

    /// Encode this request into a buffer of at least
    /// [`encoded_len`](Self::encoded_len) bytes.
    ///
    /// Returns the number of bytes written. An empty multi-key request
    /// encodes to nothing.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        match self {
            Request::Get { key } => encode_keyed(buf, b"get ", key, None),
            Request::GetMulti { keys } => encode_multi(buf, b"get", keys),
            Request::Gets { keys } => encode_multi(buf, b"gets", keys),
            Request::Store {
                mode,
                key,
                value,
                flags,
                exptime,
            } => encode_storage(buf, mode.verb(), key, value, *flags, *exptime, None),
            Request::Cas {
                key,
                value,
                flags,
                exptime,
                cas_unique,
            } => encode_storage(buf, b"cas", key, value, *flags, *exptime, Some(*cas_unique)),
            Request::Incr { key, delta } => encode_keyed(buf, b"incr ", key, Some(*delta)),
            Request::Decr { key, delta } => encode_keyed(buf, b"decr ", key, Some(*delta)),
            Request::Delete { key } => encode_keyed(buf, b"delete ", key, None),
            Request::Touch { key, exptime } => {
                encode_keyed(buf, b"touch ", key, Some(u64::from(*exptime)))
            }
        }
    }

    /// Encode this request into a freshly allocated, exactly-sized buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        let len = self.encode(&mut buf);
        buf.truncate(len);
        buf
    }
}

/// Builder for storage requests with optional flags and exptime.
#[derive(Debug, Clone)]
pub struct StoreRequest<'a> {
    mode: StoreMode,
    key: &'a [u8],
    value: &'a [u8],
    flags: u32,
    exptime: u32,
}

impl<'a> StoreRequest<'a> {
    #[inline]
    fn new(mode: StoreMode, key: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            mode,
            key,
            value,
            flags: 0,
            exptime: 0,
        }
    }

    /// Set the flags value.
    #[inline]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the expiration time in seconds.
    #[inline]
    pub fn exptime(mut self, exptime: u32) -> Self {
        self.exptime = exptime;
        self
    }

    /// Build the final request.
    #[inline]
    pub fn build(self) -> Request<'a> {
        Request::Store {
            mode: self.mode,
            key: self.key,
            value: self.value,
            flags: self.flags,
            exptime: self.exptime,
        }
    }
}

/// Write `value` as ASCII decimal, returning the number of bytes written.
fn write_decimal(buf: &mut [u8], mut value: u64) -> usize {
    let mut digits = [0u8; MAX_DIGITS];
    let mut n = 0;
    loop {
        digits[n] = b'0' + (value % 10) as u8;
        n += 1;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    for (i, d) in digits[..n].iter().rev().enumerate() {
        buf[i] = *d;
    }
    n
}

/// Encode `<prefix><key>[ <number>]\r\n`. The prefix includes its trailing space.
fn encode_keyed(buf: &mut [u8], prefix: &[u8], key: &[u8], arg: Option<u64>) -> usize {
    let mut pos = 0;
    buf[pos..pos + prefix.len()].copy_from_slice(prefix);
    pos += prefix.len();
    buf[pos..pos + key.len()].copy_from_slice(key);
    pos += key.len();
    if let Some(arg) = arg {
        buf[pos] = b' ';
        pos += 1;
        pos += write_decimal(&mut buf[pos..], arg);
    }
    buf[pos..pos + 2].copy_from_slice(NEWLINE);
    pos + 2
}

/// Encode `<cmd> <key1> <key2> ...\r\n`.
fn encode_multi(buf: &mut [u8], cmd: &[u8], keys: &[&[u8]]) -> usize {
    if keys.is_empty() {
        return 0;
    }

    let mut pos = 0;
    buf[pos..pos + cmd.len()].copy_from_slice(cmd);
    pos += cmd.len();

    for key in keys {
        buf[pos] = b' ';
        pos += 1;
        buf[pos..pos + key.len()].copy_from_slice(key);
        pos += key.len();
    }

    buf[pos..pos + 2].copy_from_slice(NEWLINE);
    pos + 2
}

/// Encode a storage command:
/// `<cmd> <key> <flags> <exptime> <bytes>[ <cas_unique>]\r\n<data>\r\n`
fn encode_storage(
    buf: &mut [u8],
    cmd: &[u8],
    key: &[u8],
    value: &[u8],
    flags: u32,
    exptime: u32,
    cas_unique: Option<u64>,
) -> usize {
    let mut pos = 0;

    buf[pos..pos + cmd.len()].copy_from_slice(cmd);
    pos += cmd.len();
    buf[pos] = b' ';
    pos += 1;
    buf[pos..pos + key.len()].copy_from_slice(key);
    pos += key.len();

    let numbers = [
        Some(u64::from(flags)),
        Some(u64::from(exptime)),
        Some(value.len() as u64),
        cas_unique,
    ];
    for n in numbers.into_iter().flatten() {
        buf[pos] = b' ';
        pos += 1;
        pos += write_decimal(&mut buf[pos..], n);
    }
    buf[pos..pos + 2].copy_from_slice(NEWLINE);
    pos += 2;

    buf[pos..pos + value.len()].copy_from_slice(value);
    pos += value.len();
    buf[pos..pos + 2].copy_from_slice(NEWLINE);
    pos + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_get() {
        assert_eq!(Request::get(b"mykey").to_vec(), b"get mykey\r\n");
    }

    #[test]
    fn test_encode_get_multi() {
        let keys: &[&[u8]] = &[b"key1", b"key2", b"key3"];
        assert_eq!(Request::get_multi(keys).to_vec(), b"get key1 key2 key3\r\n");
    }

    #[test]
    fn test_encode_gets() {
        let keys: &[&[u8]] = &[b"single"];
        assert_eq!(Request::gets(keys).to_vec(), b"gets single\r\n");
    }

    #[test]
    fn test_encode_multi_empty() {
        let keys: &[&[u8]] = &[];
        let mut buf = [0u8; 16];
        assert_eq!(Request::get_multi(keys).encode(&mut buf), 0);
    }

    #[test]
    fn test_encode_set() {
        assert_eq!(
            Request::set(b"mykey", b"myvalue").build().to_vec(),
            b"set mykey 0 0 7\r\nmyvalue\r\n"
        );
    }

    #[test]
    fn test_encode_set_with_options() {
        let request = Request::set(b"mykey", b"myvalue")
            .flags(123)
            .exptime(3600)
            .build();
        assert_eq!(request.to_vec(), b"set mykey 123 3600 7\r\nmyvalue\r\n");
    }

    #[test]
    fn test_encode_store_verbs() {
        assert_eq!(
            Request::add(b"k", b"v")
                .flags(99)
                .exptime(300)
                .build()
                .to_vec(),
            b"add k 99 300 1\r\nv\r\n"
        );
        assert_eq!(
            Request::replace(b"k", b"v").build().to_vec(),
            b"replace k 0 0 1\r\nv\r\n"
        );
        assert_eq!(
            Request::append(b"mykey", b"extra").to_vec(),
            b"append mykey 0 0 5\r\nextra\r\n"
        );
        assert_eq!(
            Request::prepend(b"mykey", b"prefix").to_vec(),
            b"prepend mykey 0 0 6\r\nprefix\r\n"
        );
    }

    #[test]
    fn test_encode_set_empty_value() {
        assert_eq!(
            Request::set(b"k", b"").build().to_vec(),
            b"set k 0 0 0\r\n\r\n"
        );
    }

    #[test]
    fn test_encode_cas() {
        assert_eq!(
            Request::cas(b"mykey", b"myvalue", 12345).to_vec(),
            b"cas mykey 0 0 7 12345\r\nmyvalue\r\n"
        );
        let request = Request::Cas {
            key: b"k",
            value: b"v",
            flags: 42,
            exptime: 600,
            cas_unique: u64::MAX,
        };
        assert_eq!(
            request.to_vec(),
            b"cas k 42 600 1 18446744073709551615\r\nv\r\n"
        );
    }

    #[test]
    fn test_encode_incr_decr() {
        assert_eq!(Request::incr(b"counter", 1).to_vec(), b"incr counter 1\r\n");
        assert_eq!(
            Request::decr(b"counter", 99999).to_vec(),
            b"decr counter 99999\r\n"
        );
        assert_eq!(Request::incr(b"c", 0).to_vec(), b"incr c 0\r\n");
    }

    #[test]
    fn test_encode_delete() {
        assert_eq!(Request::delete(b"mykey").to_vec(), b"delete mykey\r\n");
    }

    #[test]
    fn test_encode_touch() {
        assert_eq!(Request::touch(b"mykey", 60).to_vec(), b"touch mykey 60\r\n");
    }

    #[test]
    fn test_key_copied_verbatim() {
        // Reserved bytes are the caller's problem; the encoder does not escape.
        assert_eq!(Request::delete(b"a b").to_vec(), b"delete a b\r\n");
        assert_eq!(
            Request::get("ключ".as_bytes()).to_vec(),
            [b"get ".as_slice(), "ключ".as_bytes(), b"\r\n".as_slice()].concat()
        );
    }

    #[test]
    fn test_encoded_len_is_upper_bound() {
        let keys: &[&[u8]] = &[b"a", b"bb"];
        let requests = [
            Request::get(b"key"),
            Request::get_multi(keys),
            Request::set(b"key", b"value")
                .flags(u32::MAX)
                .exptime(u32::MAX)
                .build(),
            Request::cas(b"key", b"value", u64::MAX),
            Request::incr(b"key", u64::MAX),
            Request::delete(b"key"),
            Request::touch(b"key", u32::MAX),
        ];
        for request in requests {
            let mut buf = vec![0u8; request.encoded_len()];
            let len = request.encode(&mut buf);
            assert!(len <= request.encoded_len(), "{request:?}");
        }
    }
}
