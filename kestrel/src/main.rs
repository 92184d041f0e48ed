use std::{
    env, io,
    net::{IpAddr, Ipv4Addr},
    process::ExitCode,
};

use anyhow::{Context, Result};
use hickory_resolver::{
    name_server::GenericConnector, proto::runtime::TokioRuntimeProvider, system_conf, TokioResolver,
};
use kestrel_addr::{
    AddressFamily, AddressMapState, AddressResolver, Network, Options, SystemNetwork,
};
use serde_json::json;
use tokio::runtime::Runtime;

/// Host lookups through hickory when the system DNS config is readable,
/// everything else straight from the OS.
struct HickoryNetwork {
    dns: Option<(Runtime, TokioResolver)>,
    system: SystemNetwork,
}

impl HickoryNetwork {
    fn new() -> Self {
        let dns = match Self::build_resolver() {
            Ok(dns) => Some(dns),
            Err(e) => {
                log::warn!("Falling back to the system resolver: {:#}", e);
                None
            }
        };

        Self {
            dns,
            system: SystemNetwork::new(),
        }
    }

    fn build_resolver() -> Result<(Runtime, TokioResolver)> {
        let runtime = Runtime::new().context("starting tokio runtime")?;

        let (config, opts) = system_conf::read_system_conf().context("reading resolv.conf")?;
        let provider = GenericConnector::new(TokioRuntimeProvider::new());
        let resolver = TokioResolver::builder_with_config(config, provider)
            .with_options(opts)
            .build();

        Ok((runtime, resolver))
    }
}

impl Network for HickoryNetwork {
    fn lookup_hostname(&self, name: &str) -> io::Result<Ipv4Addr> {
        let Some((runtime, resolver)) = &self.dns else {
            return self.system.lookup_hostname(name);
        };

        let response = runtime
            .block_on(resolver.lookup_ip(name))
            .map_err(io::Error::other)?;

        response
            .iter()
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no A record for {}", name)))
    }

    fn local_hostname(&self) -> io::Result<String> {
        self.system.local_hostname()
    }

    fn interface_address(&self, family: AddressFamily) -> io::Result<IpAddr> {
        self.system.interface_address(family)
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: kestrel <torrc|options.json> [address ...]");
        return Ok(ExitCode::FAILURE);
    };

    let mut options = Options::load(&path)?;
    options
        .validate()
        .with_context(|| format!("validating {}", path))?;

    let state = AddressMapState::global();
    state.load(&options.map_address);

    let rewrites: Vec<_> = args
        .map(|address| {
            let rewrite = state.rewrite(&address);
            json!({ "from": address, "rewrite": rewrite })
        })
        .collect();

    let resolver = AddressResolver::new(HickoryNetwork::new());
    let (self_address, code) = match resolver.resolve(&options.self_address_config()) {
        Ok(resolved) => (json!(resolved), ExitCode::SUCCESS),
        Err(e) => {
            log::error!("Could not determine our address: {}", e);
            (json!({ "error": e.to_string() }), ExitCode::FAILURE)
        }
    };

    let report = json!({
        "mappings": state.list(),
        "rewrites": rewrites,
        "self_address": self_address,
        "my_family": options.my_family,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_fall_back_without_system_dns() {
        let network = HickoryNetwork {
            dns: None,
            system: SystemNetwork::new(),
        };

        assert_eq!(network.lookup_hostname("127.0.0.1").unwrap(), Ipv4Addr::LOCALHOST);
    }
}
