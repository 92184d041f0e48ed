pub mod address_map;
pub mod bridge;
pub mod config;
pub mod error;
pub mod family;
pub mod map_state;
pub mod network;
pub mod pattern;
pub mod resolve;
pub mod rewrite;
pub mod transport;

pub use address_map::{AddressMap, Expiry, RewriteRule};
pub use config::Options;
pub use error::{PatternError, ResolveError, RewriteError};
pub use map_state::AddressMapState;
pub use network::{AddressFamily, Network, SystemNetwork};
pub use resolve::{AddressResolver, ResolveMethod, ResolvedAddress, SelfAddressConfig};
pub use rewrite::Rewrite;



#[cfg(test)]
mod resolve_tests {
    use super::*;
    use crate::{error::LookupStage, network::fake::FakeNetwork};
    use std::net::Ipv4Addr;

    fn configured(address: &str) -> SelfAddressConfig {
        SelfAddressConfig {
            address: Some(address.to_string()),
            authority: false,
        }
    }

    fn unset() -> SelfAddressConfig {
        SelfAddressConfig::default()
    }

    #[test]
    fn test_configured_literal() {
        let net = FakeNetwork::new();
        let r = AddressResolver::new(&net)
            .resolve(&configured("128.52.128.105"))
            .unwrap();

        assert_eq!(r.method, ResolveMethod::Configured);
        assert_eq!(r.hostname, None);
        assert_eq!(r.to_bits(), 0x80348069);
        assert_eq!(net.lookups.get(), 0);
    }

    #[test]
    fn test_configured_hostname() {
        let net = FakeNetwork::new().resolving_to(Ipv4Addr::new(1, 1, 1, 1));
        let r = AddressResolver::new(&net)
            .resolve(&configured("www.torproject.org"))
            .unwrap();

        assert_eq!(net.lookups.get(), 1);
        assert_eq!(r.method, ResolveMethod::Resolved);
        assert_eq!(r.hostname.as_deref(), Some("www.torproject.org"));
        assert_eq!(r.to_bits(), 0x01010101);
    }

    #[test]
    fn test_local_hostname_resolves() {
        let net = FakeNetwork::new()
            .with_hostname("onionrouter!")
            .resolving_to(Ipv4Addr::new(1, 1, 1, 1));
        let r = AddressResolver::new(&net).resolve(&unset()).unwrap();

        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.lookups.get(), 1);
        assert_eq!(r.method, ResolveMethod::Gethostname);
        assert_eq!(r.hostname.as_deref(), Some("onionrouter!"));
        assert_eq!(r.address, Ipv4Addr::new(1, 1, 1, 1));
    }

    #[test]
    fn test_configured_loopback_fails() {
        let net = FakeNetwork::new().with_interface_v4(Ipv4Addr::new(8, 8, 8, 8));
        let err = AddressResolver::new(&net)
            .resolve(&configured("127.0.0.1"))
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::InternalAddressRejected {
                method: ResolveMethod::Configured,
                ..
            }
        ));
        assert_eq!(net.hostnames.get(), 0);
        assert_eq!(net.interface_v4_calls.get(), 0);
    }

    #[test]
    fn test_unresolvable_configured_hostname_fails() {
        for name in ["www.tor-project.org", "some_hostname"] {
            let net = FakeNetwork::new()
                .with_hostname("onionrouter!")
                .with_interface_v4(Ipv4Addr::new(8, 8, 8, 8));
            let err = AddressResolver::new(&net).resolve(&configured(name)).unwrap_err();

            assert!(matches!(
                err,
                ResolveError::LookupFailure {
                    stage: LookupStage::ConfiguredHostname,
                    ..
                }
            ));
            assert_eq!(net.lookups.get(), 1);
            assert_eq!(net.hostnames.get(), 0);
            assert_eq!(net.interface_v4_calls.get(), 0);
        }
    }

    #[test]
    fn test_gethostname_failure_is_fatal() {
        let net = FakeNetwork::new().with_interface_v4(Ipv4Addr::new(8, 8, 8, 8));
        let err = AddressResolver::new(&net).resolve(&unset()).unwrap_err();

        assert!(matches!(
            err,
            ResolveError::LookupFailure {
                stage: LookupStage::LocalHostname,
                ..
            }
        ));
        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.interface_v4_calls.get(), 0);
    }

    #[test]
    fn test_unresolvable_hostname_uses_interface() {
        let net = FakeNetwork::new()
            .with_hostname("onionrouter!")
            .with_interface_v4(Ipv4Addr::new(8, 8, 8, 8));
        let r = AddressResolver::new(&net).resolve(&unset()).unwrap();

        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.interface_v4_calls.get(), 1);
        assert_eq!(net.interface_hinted_calls.get(), 0);
        assert_eq!(r.method, ResolveMethod::Interface);
        assert_eq!(r.hostname, None);
        assert_eq!(r.address, Ipv4Addr::new(8, 8, 8, 8));
    }

    #[test]
    fn test_unresolvable_hostname_and_no_interface_fails() {
        let net = FakeNetwork::new().with_hostname("onionrouter!");
        let err = AddressResolver::new(&net).resolve(&unset()).unwrap_err();

        assert!(matches!(
            err,
            ResolveError::LookupFailure {
                stage: LookupStage::Interface,
                ..
            }
        ));
        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.interface_v4_calls.get(), 1);
    }

    #[test]
    fn test_internal_hostname_uses_hinted_interface() {
        let net = FakeNetwork::new()
            .with_hostname("onionrouter!")
            .resolving_to(Ipv4Addr::LOCALHOST)
            .with_interface_hinted(Ipv4Addr::new(9, 9, 9, 9));
        let r = AddressResolver::new(&net).resolve(&unset()).unwrap();

        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.lookups.get(), 1);
        assert_eq!(net.interface_hinted_calls.get(), 1);
        assert_eq!(net.interface_v4_calls.get(), 0);
        assert_eq!(net.last_family.get(), Some(AddressFamily::Inet));
        assert_eq!(r.method, ResolveMethod::Interface);
        assert_eq!(r.hostname, None);
        assert_eq!(r.to_bits(), 0x09090909);
    }

    #[test]
    fn test_internal_hostname_and_failed_interface_fails() {
        let net = FakeNetwork::new()
            .with_hostname("onionrouter!")
            .resolving_to(Ipv4Addr::LOCALHOST);
        let err = AddressResolver::new(&net).resolve(&unset()).unwrap_err();

        assert!(matches!(err, ResolveError::LookupFailure { .. }));
        assert_eq!(net.lookups.get(), 1);
        assert_eq!(net.interface_hinted_calls.get(), 1);
    }

    #[test]
    fn test_authority_never_falls_back_to_internal() {
        let net = FakeNetwork::new()
            .with_hostname("127.0.0.1")
            .with_interface_hinted(Ipv4Addr::new(192, 168, 1, 10));
        let config = SelfAddressConfig {
            address: None,
            authority: true,
        };
        let err = AddressResolver::new(&net).resolve(&config).unwrap_err();

        assert!(matches!(err, ResolveError::InternalAddressRejected { .. }));
        assert_eq!(net.hostnames.get(), 1);
        assert_eq!(net.lookups.get(), 0);
    }

    #[test]
    fn test_every_call_starts_over() {
        let net = FakeNetwork::new()
            .with_hostname("onionrouter!")
            .resolving_to(Ipv4Addr::new(1, 1, 1, 1));
        let resolver = AddressResolver::new(&net);

        let first = resolver.resolve(&unset()).unwrap();
        let second = resolver.resolve(&unset()).unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.network().hostnames.get(), 2);
        assert_eq!(resolver.network().lookups.get(), 2);
    }
}
