//! SOCKS5 wire format for the local proxy (RFC 1928, no-auth `CONNECT` only).
//!
//! Parsers take whatever bytes have arrived so far and answer
//! [`Parse::Incomplete`] until a whole message is buffered.

use std::fmt;

use super::error::SocksError;

pub const VERSION: u8 = 5;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NONE_ACCEPTABLE: u8 = 0xff;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Outcome of parsing a possibly partial buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Parse<T> {
    Incomplete,
    /// The message and the number of bytes it used.
    Done(T, usize),
}

/// Where a `CONNECT` request wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or address literal, without brackets.
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Reply codes sent back for a `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    HostUnreachable = 0x04,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl Reply {
    /// The reply a rejected request deserves.
    #[must_use]
    pub fn for_error(err: &SocksError) -> Self {
        match err {
            SocksError::Command(_) => Self::CommandNotSupported,
            SocksError::AddressType(_) => Self::AddressTypeNotSupported,
            _ => Self::GeneralFailure,
        }
    }

    /// Encoded reply with an unspecified bound address.
    #[must_use]
    pub fn encode(self) -> [u8; 10] {
        [VERSION, self as u8, 0, ATYP_IPV4, 0, 0, 0, 0, 0, 0]
    }
}

/// Parse the method-selection greeting. Succeeds only when the client offers
/// "no authentication".
///
/// # Errors
///
/// Returns an error for another protocol version or when no-auth is missing.
pub fn parse_greeting(buf: &[u8]) -> Result<Parse<()>, SocksError> {
    let [version, count, ..] = *buf else {
        return Ok(Parse::Incomplete);
    };
    if version != VERSION {
        return Err(SocksError::Version(version));
    }
    let len = 2 + usize::from(count);
    let Some(methods) = buf.get(2..len) else {
        return Ok(Parse::Incomplete);
    };
    if methods.contains(&METHOD_NO_AUTH) {
        Ok(Parse::Done((), len))
    } else {
        Err(SocksError::NoAcceptableMethod)
    }
}

/// Method-selection answer: no-auth when `accepted`, otherwise "none".
#[must_use]
pub fn method_selection(accepted: bool) -> [u8; 2] {
    if accepted {
        [VERSION, METHOD_NO_AUTH]
    } else {
        [VERSION, METHOD_NONE_ACCEPTABLE]
    }
}

/// Parse a `CONNECT` request.
///
/// # Errors
///
/// Returns an error for another version, command or address type, or an
/// empty or non-UTF-8 host name.
pub fn parse_request(buf: &[u8]) -> Result<Parse<Target>, SocksError> {
    let [version, command, _reserved, atyp, ..] = *buf else {
        return Ok(Parse::Incomplete);
    };
    if version != VERSION {
        return Err(SocksError::Version(version));
    }
    if command != CMD_CONNECT {
        return Err(SocksError::Command(command));
    }
    let (host, addr_end) = match atyp {
        ATYP_IPV4 => {
            let Some(octets) = buf.get(4..8) else {
                return Ok(Parse::Incomplete);
            };
            let host = octets
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(".");
            (host, 8)
        }
        ATYP_DOMAIN => {
            let Some(&len) = buf.get(4) else {
                return Ok(Parse::Incomplete);
            };
            let end = 5 + usize::from(len);
            let Some(raw) = buf.get(5..end) else {
                return Ok(Parse::Incomplete);
            };
            if raw.is_empty() {
                return Err(SocksError::Malformed("empty host name"));
            }
            let host = std::str::from_utf8(raw)
                .map_err(|_| SocksError::Malformed("host name is not UTF-8"))?;
            (host.to_string(), end)
        }
        ATYP_IPV6 => {
            let Some(octets) = buf.get(4..20) else {
                return Ok(Parse::Incomplete);
            };
            let host = octets
                .chunks(2)
                .map(|pair| format!("{:x}", u16::from_be_bytes([pair[0], pair[1]])))
                .collect::<Vec<_>>()
                .join(":");
            (host, 20)
        }
        other => return Err(SocksError::AddressType(other)),
    };
    let Some(port) = buf.get(addr_end..addr_end + 2) else {
        return Ok(Parse::Incomplete);
    };
    Ok(Parse::Done(
        Target {
            host,
            port: u16::from_be_bytes([port[0], port[1]]),
        },
        addr_end + 2,
    ))
}
