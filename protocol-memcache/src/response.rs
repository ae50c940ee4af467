//! Memcache reply types and parsing.
//!
//! Reply types:
//! - `VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\n... END\r\n` - GET/GETS reply
//! - `STORED\r\n` / `NOT_STORED\r\n` / `EXISTS\r\n` - storage replies
//! - `DELETED\r\n` - DELETE hit
//! - `TOUCHED\r\n` - TOUCH hit
//! - `NOT_FOUND\r\n` - miss for DELETE, TOUCH, INCR/DECR and CAS
//! - `<number>\r\n` - INCR/DECR result
//! - `ERROR\r\n` - Generic error
//! - `CLIENT_ERROR <msg>\r\n` - Client error
//! - `SERVER_ERROR <msg>\r\n` - Server error

use crate::error::ParseError;

/// Maximum value data size (1MB, the memcached default item size limit).
pub const MAX_VALUE_DATA_LEN: usize = 1024 * 1024;

/// A single value from a GET reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub key: Vec<u8>,
    pub flags: u32,
    pub data: Vec<u8>,
    /// CAS unique token, present when the reply is to a `gets` command.
    pub cas: Option<u64>,
}

/// A parsed Memcache reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Values from GET, one per hit, terminated by END on the wire.
    /// An empty list is a full miss.
    Values(Vec<Value>),
    /// STORED
    Stored,
    /// NOT_STORED
    NotStored,
    /// EXISTS (CAS token mismatch)
    Exists,
    /// DELETED
    Deleted,
    /// TOUCHED
    Touched,
    /// NOT_FOUND
    NotFound,
    /// Numeric reply from INCR/DECR (the new value after the operation).
    Numeric(u64),
    /// Generic error
    Error,
    /// Client error with message
    ClientError(Vec<u8>),
    /// Server error with message
    ServerError(Vec<u8>),
}

impl Response {
    /// The leading token of this reply as it appears on the wire.
    pub fn token(&self) -> &'static str {
        match self {
            Response::Values(values) if values.is_empty() => "END",
            Response::Values(_) => "VALUE",
            Response::Stored => "STORED",
            Response::NotStored => "NOT_STORED",
            Response::Exists => "EXISTS",
            Response::Deleted => "DELETED",
            Response::Touched => "TOUCHED",
            Response::NotFound => "NOT_FOUND",
            Response::Numeric(_) => "<number>",
            Response::Error => "ERROR",
            Response::ClientError(_) => "CLIENT_ERROR",
            Response::ServerError(_) => "SERVER_ERROR",
        }
    }

    /// Returns true if this is an error reply.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::Error | Response::ClientError(_) | Response::ServerError(_)
        )
    }

    /// Returns true if this represents a cache miss.
    #[inline]
    pub fn is_miss(&self) -> bool {
        match self {
            Response::Values(values) => values.is_empty(),
            Response::NotFound => true,
            _ => false,
        }
    }

    /// Parse a reply from a byte buffer.
    ///
    /// Returns the parsed reply and the number of bytes consumed. A value
    /// block is consumed as a whole, through its END terminator.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), ParseError> {
        let line_end = find_crlf(data).ok_or(ParseError::Incomplete)?;
        let line = &data[..line_end];
        let consumed = line_end + 2;

        let response = match line {
            b"STORED" => Response::Stored,
            b"NOT_STORED" => Response::NotStored,
            b"EXISTS" => Response::Exists,
            b"DELETED" => Response::Deleted,
            b"TOUCHED" => Response::Touched,
            b"NOT_FOUND" => Response::NotFound,
            b"END" => Response::Values(Vec::new()),
            b"ERROR" => Response::Error,
            _ if line.starts_with(b"CLIENT_ERROR ") => Response::ClientError(line[13..].to_vec()),
            _ if line.starts_with(b"SERVER_ERROR ") => Response::ServerError(line[13..].to_vec()),
            _ if line.starts_with(b"VALUE ") => return parse_value_response(data),
            _ if !line.is_empty() && line.iter().all(u8::is_ascii_digit) => {
                Response::Numeric(parse_u64(line)?)
            }
            _ => return Err(ParseError::Protocol("unknown response")),
        };
        Ok((response, consumed))
    }
}

/// Find the first \r\n in data, return position of \r. A lone \r is
/// line content.
fn find_crlf(data: &[u8]) -> Option<usize> {
    memchr::memmem::find(data, b"\r\n")
}

/// Parse a VALUE block (one or more values followed by END).
fn parse_value_response(data: &[u8]) -> Result<(Response, usize), ParseError> {
    let mut values = Vec::new();
    let mut pos = 0;

    loop {
        let remaining = &data[pos..];
        let line_end = find_crlf(remaining).ok_or(ParseError::Incomplete)?;
        let line = &remaining[..line_end];

        if line == b"END" {
            pos += line_end + 2;
            break;
        }

        // VALUE <key> <flags> <bytes> [<cas unique>]
        if !line.starts_with(b"VALUE ") {
            return Err(ParseError::Protocol("expected VALUE or END"));
        }

        let parts: Vec<&[u8]> = line[6..].split(|&b| b == b' ').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(ParseError::Protocol("invalid VALUE line"));
        }

        let key = parts[0].to_vec();
        let flags = parse_u32(parts[1])?;
        let bytes = parse_usize(parts[2])?;
        let cas = match parts.get(3) {
            Some(token) => Some(parse_u64(token)?),
            None => None,
        };

        pos += line_end + 2;

        let data_end = pos + bytes;
        if data.len() < data_end + 2 {
            return Err(ParseError::Incomplete);
        }
        if &data[data_end..data_end + 2] != b"\r\n" {
            return Err(ParseError::Protocol("missing data terminator"));
        }

        values.push(Value {
            key,
            flags,
            data: data[pos..data_end].to_vec(),
            cas,
        });
        pos = data_end + 2;
    }

    Ok((Response::Values(values), pos))
}

fn parse_number<T: std::str::FromStr>(data: &[u8]) -> Result<T, ParseError> {
    std::str::from_utf8(data)
        .map_err(|_| ParseError::InvalidNumber)?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

fn parse_u32(data: &[u8]) -> Result<u32, ParseError> {
    parse_number(data)
}

fn parse_u64(data: &[u8]) -> Result<u64, ParseError> {
    parse_number(data)
}

/// Parse a data block length, rejecting anything above [`MAX_VALUE_DATA_LEN`].
fn parse_usize(data: &[u8]) -> Result<usize, ParseError> {
    let value: usize = parse_number(data)?;
    if value > MAX_VALUE_DATA_LEN {
        return Err(ParseError::Protocol("value data too large"));
    }
    Ok(value)
}
