use crate::error::{BenchError, Result};
use std::net::{SocketAddr, ToSocketAddrs};

/// The address every worker uses to find the group: rank 0 listens on it,
/// everyone else connects to it.
///
/// Chosen once before any worker starts and handed to each of them by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RendezvousEndpoint {
    pub host: String,
    pub port: u16,
}

impl RendezvousEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve to the first socket address for `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BenchError::rendezvous(format!("resolve {self}: {e}")))?
            .next()
            .ok_or_else(|| BenchError::rendezvous(format!("{self} resolved to no address")))
    }
}

impl From<SocketAddr> for RendezvousEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl std::fmt::Display for RendezvousEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
