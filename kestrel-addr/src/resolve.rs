//! Working out which IPv4 address this node should advertise.
//!
//! The order is fixed: an explicit `Address` is honoured or rejected, never
//! second-guessed. Without one we try the machine's hostname, then the
//! interface list. Authorities never fall back to an internal address.

use std::{fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{LookupStage, ResolveError},
    network::{expect_v4, AddressFamily, Network},
};

/// Loopback, RFC 1918, link-local and `0.0.0.0/8`.
pub fn is_internal(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_private() || addr.is_link_local() || addr.octets()[0] == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveMethod {
    Configured,
    Resolved,
    Gethostname,
    Interface,
}

impl ResolveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMethod::Configured => "CONFIGURED",
            ResolveMethod::Resolved => "RESOLVED",
            ResolveMethod::Gethostname => "GETHOSTNAME",
            ResolveMethod::Interface => "INTERFACE",
        }
    }
}

impl fmt::Display for ResolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub address: Ipv4Addr,
    pub method: ResolveMethod,
    /// Set for `Resolved` and `Gethostname` only.
    pub hostname: Option<String>,
}

impl ResolvedAddress {
    /// The address as a host-order integer: the first octet is the most
    /// significant byte.
    pub fn to_bits(&self) -> u32 {
        u32::from(self.address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAddressConfig {
    pub address: Option<String>,
    pub authority: bool,
}

pub struct AddressResolver<N> {
    network: N,
}

impl<N: Network> AddressResolver<N> {
    pub fn new(network: N) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn resolve(&self, config: &SelfAddressConfig) -> Result<ResolvedAddress, ResolveError> {
        let configured = config
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());

        let resolved = match configured {
            Some(address) => self.resolve_configured(address)?,
            None => self.resolve_guessed(config.authority)?,
        };

        log::info!(
            "Using {} as our address ({}{})",
            resolved.address,
            resolved.method,
            resolved
                .hostname
                .as_deref()
                .map(|h| format!(", from {}", h))
                .unwrap_or_default()
        );
        Ok(resolved)
    }

    fn resolve_configured(&self, address: &str) -> Result<ResolvedAddress, ResolveError> {
        if let Ok(literal) = address.parse::<Ipv4Addr>() {
            if is_internal(literal) {
                log::warn!(
                    "Configured Address {} is an internal address; refusing to advertise it",
                    literal
                );
                return Err(ResolveError::InternalAddressRejected {
                    address: literal,
                    method: ResolveMethod::Configured,
                });
            }

            return Ok(ResolvedAddress {
                address: literal,
                method: ResolveMethod::Configured,
                hostname: None,
            });
        }

        let addr = self.network.lookup_hostname(address).map_err(|e| {
            log::warn!("Could not resolve configured Address '{}': {}", address, e);
            ResolveError::lookup(LookupStage::ConfiguredHostname, e)
        })?;

        if is_internal(addr) {
            log::warn!(
                "Configured Address '{}' resolves to internal address {}; refusing to advertise it",
                address,
                addr
            );
            return Err(ResolveError::InternalAddressRejected {
                address: addr,
                method: ResolveMethod::Resolved,
            });
        }

        Ok(ResolvedAddress {
            address: addr,
            method: ResolveMethod::Resolved,
            hostname: Some(address.to_string()),
        })
    }

    fn resolve_guessed(&self, authority: bool) -> Result<ResolvedAddress, ResolveError> {
        let hostname = self.network.local_hostname().map_err(|e| {
            log::warn!("Could not get local hostname: {}", e);
            ResolveError::lookup(LookupStage::LocalHostname, e)
        })?;

        let guessed = match hostname.parse::<Ipv4Addr>() {
            Ok(literal) => Ok(literal),
            Err(_) => self.network.lookup_hostname(&hostname),
        };

        let interface = match guessed {
            Ok(addr) if !is_internal(addr) => {
                return Ok(ResolvedAddress {
                    address: addr,
                    method: ResolveMethod::Gethostname,
                    hostname: Some(hostname),
                });
            }
            Ok(addr) => {
                log::info!(
                    "Local hostname '{}' is internal address {}; trying the interfaces",
                    hostname,
                    addr
                );
                self.hinted_interface_address()
            }
            Err(e) => {
                log::info!(
                    "Could not resolve local hostname '{}' ({}); trying the interfaces",
                    hostname,
                    e
                );
                self.network.interface_address_v4()
            }
        };

        let addr = interface.map_err(|e| {
            log::warn!("Could not get local interface address: {}", e);
            ResolveError::lookup(LookupStage::Interface, e)
        })?;

        if is_internal(addr) {
            if authority {
                log::warn!(
                    "Interface address {} is internal; directory authorities must set Address explicitly",
                    addr
                );
                return Err(ResolveError::InternalAddressRejected {
                    address: addr,
                    method: ResolveMethod::Interface,
                });
            }
            log::warn!(
                "Interface address {} is internal; others may not be able to reach us",
                addr
            );
        }

        Ok(ResolvedAddress {
            address: addr,
            method: ResolveMethod::Interface,
            hostname: None,
        })
    }

    fn hinted_interface_address(&self) -> std::io::Result<Ipv4Addr> {
        expect_v4(self.network.interface_address(AddressFamily::Inet)?)
    }
}
