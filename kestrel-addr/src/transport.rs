use std::net::SocketAddr;

use crate::{bridge::is_key_value, error::TransportLineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRole {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    Socks4,
    Socks5,
}

/// Where a parsed `{Client,Server}TransportPlugin` line takes effect.
pub trait TransportRegistry {
    fn is_needed(&mut self, transport: &str) -> bool;

    fn launch_managed_proxy(&mut self, transports: &[String], argv: &[String], role: TransportRole);

    fn add_from_config(
        &mut self,
        addr: SocketAddr,
        transport: &str,
        socks: SocksVersion,
    ) -> Result<(), TransportLineError>;
}

/// Accepts everything and does nothing; used for validation passes.
#[derive(Debug, Default)]
pub struct NoopRegistry;

impl TransportRegistry for NoopRegistry {
    fn is_needed(&mut self, _transport: &str) -> bool {
        false
    }

    fn launch_managed_proxy(&mut self, _transports: &[String], _argv: &[String], _role: TransportRole) {}

    fn add_from_config(
        &mut self,
        _addr: SocketAddr,
        _transport: &str,
        _socks: SocksVersion,
    ) -> Result<(), TransportLineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Method {
    Exec(Vec<String>),
    Socks(SocksVersion, SocketAddr),
    Proxy(SocketAddr),
}

/// Transport names are C identifiers.
pub fn is_transport_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses `<transport>[,<transport>...] <method> <args...>`.
///
/// With `validate_only` set nothing reaches `registry`.
pub fn parse_transport_line(
    line: &str,
    role: TransportRole,
    validate_only: bool,
    sandbox: bool,
    registry: &mut dyn TransportRegistry,
) -> Result<(), TransportLineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(TransportLineError::TooFewArguments);
    }

    let transports: Vec<String> = tokens[0].split(',').map(str::to_string).collect();
    if let Some(bad) = transports.iter().find(|t| !is_transport_name(t)) {
        return Err(TransportLineError::BadTransportName(bad.clone()));
    }

    let method = match (role, tokens[1]) {
        (_, "exec") => Method::Exec(tokens[2..].iter().map(|s| s.to_string()).collect()),
        (TransportRole::Client, "socks4") => Method::Socks(SocksVersion::Socks4, proxy_addr(&tokens)?),
        (TransportRole::Client, "socks5") => Method::Socks(SocksVersion::Socks5, proxy_addr(&tokens)?),
        (TransportRole::Server, "proxy") => Method::Proxy(proxy_addr(&tokens)?),
        (_, other) => return Err(TransportLineError::UnknownMethod(other.to_string())),
    };

    if !matches!(method, Method::Exec(_)) && transports.len() > 1 {
        return Err(TransportLineError::MultipleTransports);
    }

    if sandbox && matches!(method, Method::Exec(_)) {
        return Err(TransportLineError::SandboxedExec);
    }

    if validate_only {
        return Ok(());
    }

    match method {
        Method::Exec(argv) => {
            let wanted = match role {
                TransportRole::Server => true,
                TransportRole::Client => transports.iter().any(|t| registry.is_needed(t)),
            };

            if wanted {
                log::info!("Launching managed proxy {} for {}", argv[0], transports.join(","));
                registry.launch_managed_proxy(&transports, &argv, role);
            } else {
                log::info!(
                    "Not launching managed proxy {}: none of {} is needed",
                    argv[0],
                    transports.join(",")
                );
            }
        }
        Method::Socks(version, addr) => {
            let name = &transports[0];
            if registry.is_needed(name) {
                registry.add_from_config(addr, name, version)?;
            } else {
                log::debug!("Transport {} at {} is not needed", name, addr);
            }
        }
        Method::Proxy(addr) => {
            log::info!("Server transport {} at {}", transports[0], addr);
        }
    }

    Ok(())
}

fn proxy_addr(tokens: &[&str]) -> Result<SocketAddr, TransportLineError> {
    tokens[2]
        .parse::<SocketAddr>()
        .map_err(|_| TransportLineError::BadAddress(tokens[2].to_string()))
}

/// Parses a `{Client,Server}TransportOptions` line: `<transport> k=v [k=v ...]`.
///
/// A line for some other transport than `transport` gives `Ok(None)`.
pub fn options_from_transport_options_line(
    line: &str,
    transport: Option<&str>,
) -> Result<Option<Vec<String>>, TransportLineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(TransportLineError::TooFewArguments);
    }

    let name = tokens[0];
    if !is_transport_name(name) {
        return Err(TransportLineError::BadTransportName(name.to_string()));
    }

    if let Some(bad) = tokens[1..].iter().find(|t| !is_key_value(t)) {
        return Err(TransportLineError::BadOption(bad.to_string()));
    }

    if transport.is_some_and(|t| t != name) {
        return Ok(None);
    }

    Ok(Some(tokens[1..].iter().map(|s| s.to_string()).collect()))
}
