//! Name resolution.

use ks_core::BrowserError;
use ks_core::BrowserResult;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;

/// Resolves a host and port to candidate socket addresses.
pub trait DnsResolver {
    fn resolve(&self, host: &str, port: u16) -> BrowserResult<Vec<SocketAddr>>;
}

/// Uses the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> BrowserResult<Vec<SocketAddr>> {
        let addresses: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|error| {
                BrowserError::new(
                    "net.dns.resolve_failed",
                    format!("Host {host} not found ({error})"),
                )
            })?
            .collect();

        if addresses.is_empty() {
            return Err(BrowserError::new(
                "net.dns.no_results",
                format!("Host {host} not found"),
            ));
        }

        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::DnsResolver;
    use super::SystemDnsResolver;

    #[test]
    fn resolves_ip_literals_without_lookup() {
        let addresses = match SystemDnsResolver.resolve("127.0.0.1", 8080) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].port(), 8080);
    }
}
