//! Service registration records published to the discovery registry.

use std::{
    collections::HashMap,
    fmt, io,
    net::{SocketAddr, ToSocketAddrs},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Language/environment tag published by services implemented in this workspace.
pub const SERVICE_LANGUAGE: &str = "Rust";

/// A reachable host/port pair. The host may be a name or a literal IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub address: String,
    pub port: u16,
}

impl ServiceAddress {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Resolves to the first socket address of the host.
    pub fn resolve(&self) -> io::Result<SocketAddr> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no socket address for {self}"),
                )
            })
    }
}

impl From<SocketAddr> for ServiceAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid service address '{0}', expected host:port")]
pub struct AddressParseError(String);

impl FromStr for ServiceAddress {
    type Err = AddressParseError;

    /// Parses `host:port`; IPv6 hosts are written in brackets (`[::1]:9011`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Identity of a hosted service as published at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub id: String,
    pub name: String,
    pub language: String,
    pub addresses: Vec<ServiceAddress>,
    pub properties: HashMap<String, String>,
}

impl ServiceDescription {
    /// Creates a description with a generated id and no addresses yet.
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            language: language.into(),
            addresses: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_address(mut self, address: ServiceAddress) -> Self {
        self.addresses.push(address);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_literal_address() {
        let addr = ServiceAddress::localhost(9000).resolve().unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn descriptions_get_distinct_ids() {
        let a = ServiceDescription::new("skeleton", SERVICE_LANGUAGE);
        let b = ServiceDescription::new("skeleton", SERVICE_LANGUAGE);
        assert_ne!(a.id, b.id);
        assert!(a.addresses.is_empty());
    }

    #[test]
    fn socket_addr_conversion_keeps_port() {
        let addr: SocketAddr = "10.0.0.7:4711".parse().unwrap();
        let service = ServiceAddress::from(addr);
        assert_eq!(service, ServiceAddress::new("10.0.0.7", 4711));
        assert_eq!(service.to_string(), "10.0.0.7:4711");
    }

    #[test]
    fn parses_host_and_port() {
        assert_eq!(
            "localhost:9011".parse::<ServiceAddress>(),
            Ok(ServiceAddress::new("localhost", 9011))
        );
        assert_eq!(
            "[::1]:80".parse::<ServiceAddress>(),
            Ok(ServiceAddress::new("::1", 80))
        );
        assert!("localhost".parse::<ServiceAddress>().is_err());
        assert!(":80".parse::<ServiceAddress>().is_err());
        assert!("host:99999".parse::<ServiceAddress>().is_err());
    }
}
