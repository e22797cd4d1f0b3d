use crate::config::NetworkProbeConfig;
use crate::model::NetworkStatus;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

pub async fn probe_network(cfg: &NetworkProbeConfig) -> NetworkStatus {
    let start = Instant::now();
    let host = cfg.host.as_str();
    let port = cfg.port;

    let status = match time::timeout(
        Duration::from_millis(cfg.timeout_ms),
        TcpStream::connect((host, port)),
    )
    .await
    {
        Ok(Ok(_stream)) => NetworkStatus::Up,
        Ok(Err(err)) => {
            warn!(host, port, error = %err, "network probe failed");
            NetworkStatus::Down
        }
        Err(_elapsed) => {
            warn!(host, port, timeout_ms = cfg.timeout_ms, "network probe timeout");
            NetworkStatus::Down
        }
    };

    debug!(
        host,
        port,
        ?status,
        latency_ms = start.elapsed().as_millis() as u64,
        "network probe finished"
    );
    status
}
