use crate::config::{BenchConfig, PORT_SELECTION_ATTEMPTS};
use crate::error::{BenchError, Result};
use crate::group::RendezvousEndpoint;
use crate::transport::TransportListener;
use rand::Rng;

/// Choose the run's rendezvous endpoint and bind it.
///
/// An explicit port is bound as-is. Otherwise ports are drawn at random from
/// the configured range until one binds, up to `PORT_SELECTION_ATTEMPTS`
/// times. The returned listener holds the port; drop it to release the port
/// for a worker in another process.
pub async fn select_endpoint(config: &BenchConfig) -> Result<(RendezvousEndpoint, TransportListener)> {
    if let Some(port) = config.rendezvous_port {
        let endpoint = RendezvousEndpoint::new(config.host.clone(), port);
        let listener = TransportListener::bind(endpoint.socket_addr()?)
            .await
            .map_err(|e| BenchError::rendezvous(format!("port {port} unavailable: {e}")))?;
        return Ok((endpoint, listener));
    }

    let mut last_err = None;
    for attempt in 1..=PORT_SELECTION_ATTEMPTS {
        let port = rand::thread_rng().gen_range(config.port_range.clone());
        let endpoint = RendezvousEndpoint::new(config.host.clone(), port);
        match TransportListener::bind(endpoint.socket_addr()?).await {
            Ok(listener) => return Ok((endpoint, listener)),
            Err(e) => {
                tracing::debug!(port, attempt, "rendezvous port busy: {e}");
                last_err = Some(e);
            }
        }
    }

    Err(BenchError::rendezvous(format!(
        "no free port in {}..={} after {PORT_SELECTION_ATTEMPTS} attempts{}",
        config.port_range.start(),
        config.port_range.end(),
        last_err.map(|e| format!(": {e}")).unwrap_or_default()
    )))
}
