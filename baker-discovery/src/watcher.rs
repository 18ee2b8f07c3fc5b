//! Container enumeration and the `start` → `running`/`die` event feed,
//! grounded on `examples/original_source/docker.go`'s `DockerWatcher`
//! (v2 design note in `ando-store::watcher.rs`: runs on tokio, not monoio).

use std::net::SocketAddr;
use std::time::Duration;

use baker_core::Container;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const BAKER_ENABLE: &str = "baker.enable";
const BAKER_NETWORK: &str = "baker.network";
const BAKER_SERVICE_PORT: &str = "baker.service.port";
const BAKER_SERVICE_PING: &str = "baker.service.ping";

#[derive(Debug, serde::Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "State")]
    state: String,
}

#[derive(Debug, serde::Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Config")]
    config: InspectConfig,
    #[serde(rename = "NetworkSettings")]
    network_settings: NetworkSettings,
}

#[derive(Debug, serde::Deserialize)]
struct InspectConfig {
    #[serde(rename = "Labels", default)]
    labels: std::collections::HashMap<String, String>,
}

#[derive(Debug, serde::Deserialize)]
struct NetworkSettings {
    #[serde(rename = "Networks", default)]
    networks: std::collections::HashMap<String, NetworkEndpoint>,
}

#[derive(Debug, serde::Deserialize)]
struct NetworkEndpoint {
    #[serde(rename = "IPAddress")]
    ip_address: String,
}

#[derive(Debug, serde::Deserialize)]
struct DockerEvent {
    #[serde(rename = "id", default)]
    id: String,
    #[serde(rename = "status", default)]
    status: String,
}

/// Resolves a raw container ID into a `Container`, or `None` when
/// `baker.enable` isn't `"true"` (spec.md §6: the container is simply not a
/// candidate, not a malformed-configuration error).
pub struct DockerWatcher {
    client: reqwest::Client,
    base_url: String,
}

impl DockerWatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("static client config is valid"),
            base_url: base_url.into(),
        }
    }

    async fn inspect(&self, id: &str) -> anyhow::Result<Option<Container>> {
        let url = format!("{}/containers/{id}/json", self.base_url);
        let payload: ContainerInspect = self.client.get(&url).send().await?.json().await?;

        let labels = &payload.config.labels;
        if labels.get(BAKER_ENABLE).map(String::as_str) != Some("true") {
            return Ok(None);
        }

        let network_name = labels
            .get(BAKER_NETWORK)
            .ok_or_else(|| anyhow::anyhow!("container {id} missing label {BAKER_NETWORK}"))?;
        let network = payload
            .network_settings
            .networks
            .get(network_name)
            .ok_or_else(|| anyhow::anyhow!("network '{network_name}' not present for container {id}"))?;
        let port: u16 = labels
            .get(BAKER_SERVICE_PORT)
            .ok_or_else(|| anyhow::anyhow!("container {id} missing label {BAKER_SERVICE_PORT}"))?
            .parse()?;
        let config_path = labels.get(BAKER_SERVICE_PING).cloned().unwrap_or_default();

        let addr: SocketAddr = format!("{}:{port}", network.ip_address).parse()?;
        Ok(Some(Container::new(id, addr, config_path)))
    }

    async fn enumerate(&self, tx: &mpsc::Sender<Container>) -> anyhow::Result<()> {
        let url = format!("{}/containers/json", self.base_url);
        let running: Vec<ContainerSummary> = self.client.get(&url).send().await?.json().await?;
        debug!(count = running.len(), "enumerated running containers");

        for summary in running.into_iter().filter(|c| c.state == "running") {
            match self.inspect(&summary.id).await {
                Ok(Some(container)) => {
                    if tx.send(container).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(id = %summary.id, %err, "failed to inspect container"),
            }
        }
        Ok(())
    }

    async fn follow_events(&self, tx: &mpsc::Sender<Container>, cancel: &CancellationToken) -> anyhow::Result<()> {
        let url = format!("{}/events", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let mut stream = resp.bytes_stream();

        use futures_util::StreamExt;
        let mut buf = Vec::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { return Ok(()) };
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }
                let Ok(event) = serde_json::from_slice::<DockerEvent>(line) else { continue };
                if event.status != "start" && event.status != "die" {
                    continue;
                }
                if event.status == "die" {
                    if tx.send(Container::departed(event.id)).await.is_err() {
                        return Ok(());
                    }
                    continue;
                }
                match self.inspect(&event.id).await {
                    Ok(Some(container)) => {
                        if tx.send(container).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(id = %event.id, %err, "failed to inspect container"),
                }
            }
        }
    }

    /// Blocks until `cancel` fires: enumerates currently-running containers,
    /// then follows `/events` for `start`/`die` transitions.
    pub async fn run(self, tx: mpsc::Sender<Container>, cancel: CancellationToken) {
        if let Err(err) = self.enumerate(&tx).await {
            warn!(%err, "initial container enumeration failed");
        }
        if let Err(err) = self.follow_events(&tx, &cancel).await {
            warn!(%err, "event stream terminated");
        }
    }
}
