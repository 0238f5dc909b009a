//! Probe-based Network Monitor

use async_trait::async_trait;
use bridge_traits::network::NetworkMonitor;
use reqwest::Client;
use std::time::Duration;

/// Reachability monitor that probes a well-known endpoint with a HEAD
/// request. Hosts with a system reachability API should prefer a native
/// adapter over this.
pub struct ProbeNetworkMonitor {
    client: Client,
    probe_url: String,
}

impl ProbeNetworkMonitor {
    pub fn new(probe_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build probe HTTP client");
        Self {
            client,
            probe_url: probe_url.into(),
        }
    }
}

#[async_trait]
impl NetworkMonitor for ProbeNetworkMonitor {
    async fn is_connected(&self) -> bool {
        self.client.head(&self.probe_url).send().await.is_ok()
    }
}
