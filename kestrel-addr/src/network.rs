use std::{
    io,
    net::{IpAddr, Ipv4Addr, ToSocketAddrs},
};

use crate::resolve::is_internal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

/// Blocking host lookups the self-address resolver is written against.
pub trait Network {
    fn lookup_hostname(&self, name: &str) -> io::Result<Ipv4Addr>;

    fn local_hostname(&self) -> io::Result<String>;

    fn interface_address(&self, family: AddressFamily) -> io::Result<IpAddr>;

    fn interface_address_v4(&self) -> io::Result<Ipv4Addr> {
        expect_v4(self.interface_address(AddressFamily::Inet)?)
    }
}

pub(crate) fn expect_v4(addr: IpAddr) -> io::Result<Ipv4Addr> {
    match addr {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(v6) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("asked for an IPv4 interface address, got {}", v6),
        )),
    }
}

impl<N: Network + ?Sized> Network for &N {
    fn lookup_hostname(&self, name: &str) -> io::Result<Ipv4Addr> {
        (**self).lookup_hostname(name)
    }

    fn local_hostname(&self) -> io::Result<String> {
        (**self).local_hostname()
    }

    fn interface_address(&self, family: AddressFamily) -> io::Result<IpAddr> {
        (**self).interface_address(family)
    }

    fn interface_address_v4(&self) -> io::Result<Ipv4Addr> {
        (**self).interface_address_v4()
    }
}

/// The operating system: `getaddrinfo`, `gethostname` and the interface list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetwork;

impl SystemNetwork {
    pub fn new() -> Self {
        Self
    }
}

impl Network for SystemNetwork {
    fn lookup_hostname(&self, name: &str) -> io::Result<Ipv4Addr> {
        log::debug!("resolving {} via getaddrinfo", name);

        (name, 0u16)
            .to_socket_addrs()?
            .find_map(|sa| match sa.ip() {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no IPv4 address for {}", name))
            })
    }

    fn local_hostname(&self) -> io::Result<String> {
        gethostname::gethostname().into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hostname {:?} is not valid UTF-8", raw),
            )
        })
    }

    fn interface_address(&self, family: AddressFamily) -> io::Result<IpAddr> {
        let candidates: Vec<IpAddr> = if_addrs::get_if_addrs()?
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip())
            .filter(|ip| match family {
                AddressFamily::Inet => ip.is_ipv4(),
                AddressFamily::Inet6 => ip.is_ipv6(),
            })
            .collect();

        let public = candidates.iter().find(|ip| match ip {
            IpAddr::V4(v4) => !is_internal(*v4),
            IpAddr::V6(v6) => !v6.is_unicast_link_local() && !v6.is_unique_local(),
        });

        public
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no {:?} address on any interface", family),
                )
            })
    }
}
