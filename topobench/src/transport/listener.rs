use crate::error::{BenchError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Delay between connection attempts while the listening side is not up yet.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Listens for incoming TCP connections on a bound address.
#[derive(Debug)]
pub struct TransportListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TransportListener {
    /// Bind on the given address. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BenchError::transport_with_source(format!("bind {addr}"), e))?;
        Self::from_listener(listener)
    }

    /// Wrap an already bound tokio listener.
    pub fn from_listener(listener: TcpListener) -> Result<Self> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| BenchError::transport_with_source("local_addr", e))?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next incoming connection with `TCP_NODELAY` set.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| BenchError::transport_with_source("accept", e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| BenchError::transport_with_source("set_nodelay", e))?;
        Ok((stream, addr))
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Connect to `addr`, retrying until `timeout` elapses.
///
/// The listening side of a rendezvous or mesh link may not be bound yet when
/// the connecting side starts, so refused connections are retried.
pub async fn connect_with_retry(addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream
                    .set_nodelay(true)
                    .map_err(|e| BenchError::transport_with_source("set_nodelay", e))?;
                tracing::debug!(%addr, attempts, "connected");
                return Ok(stream);
            }
            Err(e) => {
                if tokio::time::Instant::now() + CONNECT_RETRY_INTERVAL >= deadline {
                    return Err(BenchError::rendezvous(format!(
                        "{addr} unreachable after {attempts} attempts: {e}"
                    )));
                }
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        }
    }
}
