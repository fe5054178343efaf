use std::path::PathBuf;

use serde_json::Value;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::VpnServer;
use crate::vpn_cache::{VpnCache, VpnProtocol};

#[derive(Debug, Clone, Copy)]
pub struct Vpn<'a> {
    api: &'a ApiClient,
}

/// Result of downloading configs for every listed server.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub stored: Vec<PathBuf>,
    /// Servers whose download failed, with the error text. Other servers still proceed.
    pub failed: Vec<(VpnServer, String)>,
}

impl<'a> Vpn<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Server tree for `product` ("labs", "starting_point", "endgames", ...).
    pub async fn servers(&self, product: &str) -> Result<Value> {
        self.api
            .get("/connections/servers", &[("product", product.to_string())])
            .await
    }

    pub async fn switch(&self, server_id: u64) -> Result<Value> {
        info!(server_id, "switching VPN server");
        self.api
            .post(&format!("/connections/servers/switch/{server_id}"), None)
            .await
    }

    pub async fn status(&self) -> Result<Value> {
        self.api.get("/connection/status", &[]).await
    }

    pub async fn download_config(&self, server_id: u64, protocol: VpnProtocol) -> Result<Vec<u8>> {
        let path = match protocol {
            VpnProtocol::Udp => format!("/access/ovpnfile/{server_id}/0"),
            VpnProtocol::Tcp => format!("/access/ovpnfile/{server_id}/0/1"),
        };
        self.api.get_binary(&path, &[]).await
    }

    /// Download a config per server and protocol into `cache`, one request at a time.
    ///
    /// Listing failures abort; per-server failures are logged and collected.
    pub async fn download_all(
        &self,
        product: &str,
        protocols: &[VpnProtocol],
        cache: &VpnCache,
    ) -> Result<DownloadSummary> {
        let servers = flatten_servers(&self.servers(product).await?);
        let mut summary = DownloadSummary::default();

        'servers: for server in servers {
            for &protocol in protocols {
                let bytes = match self.download_config(server.id, protocol).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(server = %server.friendly_name, %protocol, error = %e, "VPN download failed");
                        summary.failed.push((server, e.to_string()));
                        continue 'servers;
                    }
                };
                let path = cache
                    .store(&server.friendly_name, &server.location, protocol, &bytes)
                    .await?;
                summary.stored.push(path);
            }
        }
        Ok(summary)
    }
}

/// Flatten `data.options.{location}.{group}.servers.{id}` into a list sorted by ID.
pub fn flatten_servers(value: &Value) -> Vec<VpnServer> {
    let mut servers = Vec::new();
    let Some(Value::Object(locations)) = value.pointer("/data/options") else {
        return servers;
    };
    for groups in locations.values() {
        let Value::Object(groups) = groups else { continue };
        for (group_key, group) in groups {
            let Some(Value::Object(entries)) = group.get("servers") else {
                continue;
            };
            let group_name = group
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(group_key);
            for entry in entries.values() {
                if let Ok(mut server) = serde_json::from_value::<VpnServer>(entry.clone()) {
                    server.group = group_name.to_string();
                    servers.push(server);
                }
            }
        }
    }
    servers.sort_by_key(|s| s.id);
    servers
}
