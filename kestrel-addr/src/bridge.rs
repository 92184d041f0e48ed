use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use crate::{error::BridgeLineError, transport::is_transport_name};

pub const DEFAULT_BRIDGE_PORT: u16 = 443;

/// SOCKS arguments travel in the SOCKS5 username and password fields.
pub const MAX_SOCKS_ARGS_LEN: usize = 2 * 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 20]);

impl Fingerprint {
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out).ok()?;
        Some(Self(out))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeLine {
    pub addr: SocketAddr,
    pub fingerprint: Option<Fingerprint>,
    pub transport: Option<String>,
    pub socks_args: Option<Vec<String>>,
}

/// Parses `[transport] addr[:port] [fingerprint] [k=v ...]`.
pub fn parse_bridge_line(line: &str) -> Result<BridgeLine, BridgeLineError> {
    let mut tokens = line.split_whitespace();

    let first = tokens.next().ok_or(BridgeLineError::Empty)?;
    let (transport, addr_token) = if is_transport_name(first) {
        let addr = tokens.next().ok_or(BridgeLineError::MissingAddress)?;
        (Some(first.to_string()), addr)
    } else {
        (None, first)
    };

    let addr = parse_addr_port(addr_token, DEFAULT_BRIDGE_PORT)
        .ok_or_else(|| BridgeLineError::BadAddress(addr_token.to_string()))?;

    let rest: Vec<&str> = tokens.collect();

    if transport.is_none() {
        let fingerprint = if rest.is_empty() {
            None
        } else {
            let digest = rest.concat();
            Some(parse_fingerprint(&digest)?)
        };

        return Ok(BridgeLine {
            addr,
            fingerprint,
            transport: None,
            socks_args: None,
        });
    }

    let mut rest = rest.into_iter().peekable();
    let fingerprint = match rest.next_if(|t| !t.contains('=')) {
        Some(t) => Some(parse_fingerprint(t)?),
        None => None,
    };

    let socks_args = rest
        .map(|arg| {
            if is_key_value(arg) {
                Ok(arg.to_string())
            } else {
                Err(BridgeLineError::BadSocksArgument(arg.to_string()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let len = socks_args.join(";").len();
    if len > MAX_SOCKS_ARGS_LEN {
        return Err(BridgeLineError::SocksArgumentsTooLong(len));
    }

    Ok(BridgeLine {
        addr,
        fingerprint,
        transport,
        socks_args: (!socks_args.is_empty()).then_some(socks_args),
    })
}

/// `1.2.3.4`, `1.2.3.4:9001`, `[::1]` or `[::1]:9001`.
pub(crate) fn parse_addr_port(s: &str, default_port: u16) -> Option<SocketAddr> {
    if let Ok(sa) = s.parse::<SocketAddr>() {
        return (sa.port() != 0).then_some(sa);
    }

    let ip = match s.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        Some(inner) => IpAddr::V6(inner.parse::<Ipv6Addr>().ok()?),
        None => IpAddr::V4(s.parse::<Ipv4Addr>().ok()?),
    };

    Some(SocketAddr::new(ip, default_port))
}

pub(crate) fn is_key_value(s: &str) -> bool {
    matches!(s.split_once('='), Some((k, _)) if !k.is_empty())
}

fn parse_fingerprint(s: &str) -> Result<Fingerprint, BridgeLineError> {
    Fingerprint::from_hex(s).ok_or_else(|| BridgeLineError::BadFingerprint(s.to_string()))
}
