//! Network kind and listen address resolution.
//!
//! Addresses follow the `host:port` convention, where an empty host (`":9876"`)
//! means every local interface and IPv6 hosts are bracketed (`"[::1]:9876"`).

use crate::error::TransportError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

/// Stream network kinds accepted by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkKind {
    /// IPv4 or IPv6.
    #[default]
    Tcp,
    /// IPv4 only.
    Tcp4,
    /// IPv6 only.
    Tcp6,
}

impl NetworkKind {
    /// Returns the canonical name of the network kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
        }
    }

    /// Returns true if the address may be used with this network kind.
    #[must_use]
    pub fn admits(&self, addr: &SocketAddr) -> bool {
        match self {
            Self::Tcp => true,
            Self::Tcp4 => addr.is_ipv4(),
            Self::Tcp6 => addr.is_ipv6(),
        }
    }

    /// Wildcard hosts in bind preference order. `Tcp` tries the dual-stack
    /// IPv6 wildcard first and falls back to IPv4 where IPv6 is unavailable.
    fn unspecified(&self) -> &'static [IpAddr] {
        const V4: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        const V6: IpAddr = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
        match self {
            Self::Tcp => &[V6, V4],
            Self::Tcp4 => &[V4],
            Self::Tcp6 => &[V6],
        }
    }

    /// Resolves `address` into the candidate socket addresses for this kind.
    ///
    /// # Arguments
    /// * `address` - `host:port`, `[v6]:port` or `:port`
    ///
    /// # Returns
    /// Candidates in bind preference order.
    ///
    /// # Errors
    /// Returns `TransportError` if the address is malformed or nothing
    /// usable is found.
    pub async fn resolve(&self, address: &str) -> Result<Vec<SocketAddr>, TransportError> {
        let (host, port) = split_host_port(address)?;

        let candidates: Vec<SocketAddr> = if host.is_empty() {
            self.unspecified()
                .iter()
                .map(|ip| SocketAddr::new(*ip, port))
                .collect()
        } else if let Ok(ip) = host.parse::<IpAddr>() {
            vec![SocketAddr::new(ip, port)]
        } else {
            tokio::net::lookup_host((host, port)).await?.collect()
        };

        let admitted: Vec<SocketAddr> = candidates
            .into_iter()
            .filter(|addr| self.admits(addr))
            .collect();

        if admitted.is_empty() {
            return Err(TransportError::AddressResolution {
                network: self.as_str().to_string(),
                address: address.to_string(),
            });
        }
        Ok(admitted)
    }
}

impl FromStr for NetworkKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            other => Err(TransportError::unsupported_network(other)),
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits `host:port`, stripping brackets from IPv6 hosts.
fn split_host_port(address: &str) -> Result<(&str, u16), TransportError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| TransportError::invalid_address(address, "missing port"))?;

    let port = port
        .parse::<u16>()
        .map_err(|e| TransportError::invalid_address(address, e.to_string()))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| TransportError::invalid_address(address, "unclosed bracket"))?,
        None if host.contains(':') => {
            return Err(TransportError::invalid_address(
                address,
                "IPv6 hosts must be bracketed",
            ));
        }
        None => host,
    };

    Ok((host, port))
}
