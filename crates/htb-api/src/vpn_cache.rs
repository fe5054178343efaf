use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::error::Result;

/// Returns the default VPN config cache directory: `{XDG_DATA_HOME}/htbctl/vpn/`.
pub fn cache_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("htbctl")
        .join("vpn")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VpnProtocol {
    #[default]
    Udp,
    Tcp,
}

impl fmt::Display for VpnProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VpnProtocol::Udp => "udp",
            VpnProtocol::Tcp => "tcp",
        })
    }
}

impl FromStr for VpnProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(VpnProtocol::Udp),
            "tcp" => Ok(VpnProtocol::Tcp),
            other => Err(format!("unknown protocol '{other}' (expected udp or tcp)")),
        }
    }
}

/// A downloaded `.ovpn` file, described by its `{name}_{location}_{protocol}.ovpn` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedVpn {
    pub file_name: String,
    pub name: String,
    pub location: String,
    pub protocol: VpnProtocol,
    pub path: PathBuf,
}

/// Local directory of downloaded VPN configuration files.
#[derive(Debug, Clone)]
pub struct VpnCache {
    dir: PathBuf,
}

impl Default for VpnCache {
    fn default() -> Self {
        Self { dir: cache_dir() }
    }
}

impl VpnCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a config file, replacing any previous download of the same server.
    pub async fn store(
        &self,
        name: &str,
        location: &str,
        protocol: VpnProtocol,
        contents: &[u8],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!(
            "{}_{}_{protocol}.ovpn",
            file_component(name),
            file_component(location)
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), size_bytes = contents.len(), "stored VPN config");
        Ok(path)
    }

    /// All recognisable `.ovpn` files, sorted by file name.
    pub async fn list(&self) -> Result<Vec<CachedVpn>> {
        let mut entries = Vec::new();
        if !self.dir.exists() {
            return Ok(entries);
        }
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some((name, location, protocol)) = parse_file_name(&file_name) {
                entries.push(CachedVpn {
                    name,
                    location,
                    protocol,
                    file_name,
                    path,
                });
            }
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// First cached file whose name contains `fragment` (case-insensitive) for `protocol`.
    pub async fn find(&self, fragment: &str, protocol: VpnProtocol) -> Result<Option<CachedVpn>> {
        let fragment = fragment.to_lowercase();
        Ok(self.list().await?.into_iter().find(|vpn| {
            vpn.protocol == protocol && vpn.file_name.to_lowercase().contains(&fragment)
        }))
    }
}

/// Keep `_` out of name components so file names split back unambiguously.
fn file_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn parse_file_name(file_name: &str) -> Option<(String, String, VpnProtocol)> {
    let stem = file_name.strip_suffix(".ovpn")?;
    let mut parts = stem.rsplitn(3, '_');
    let protocol = parts.next()?.parse().ok()?;
    let location = parts.next()?;
    let name = parts.next()?;
    Some((name.to_string(), location.to_string(), protocol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_name_splits_from_the_right() {
        assert_eq!(
            parse_file_name("EU-VIP-1_EU_udp.ovpn"),
            Some(("EU-VIP-1".into(), "EU".into(), VpnProtocol::Udp))
        );
        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("lab_EU_quic.ovpn"), None);
        assert_eq!(parse_file_name("lab.ovpn"), None);
    }

    #[test]
    fn file_component_replaces_separators() {
        assert_eq!(file_component("US Release_Arena 1"), "US-Release-Arena-1");
        assert_eq!(file_component("  "), "unknown");
    }

    #[tokio::test]
    async fn store_then_list_and_find() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = VpnCache::with_dir(tmp.path().join("vpn"));

        assert!(cache.list().await.unwrap().is_empty());

        let udp = cache
            .store("EU VIP 1", "EU", VpnProtocol::Udp, b"client\n")
            .await
            .unwrap();
        cache
            .store("EU VIP 1", "EU", VpnProtocol::Tcp, b"client\nproto tcp\n")
            .await
            .unwrap();
        cache
            .store("US Free 2", "US", VpnProtocol::Udp, b"client\n")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("vpn").join("README"), b"x")
            .await
            .unwrap();

        let listed = cache.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|v| v.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["EU-VIP-1_EU_tcp.ovpn", "EU-VIP-1_EU_udp.ovpn", "US-Free-2_US_udp.ovpn"]
        );

        let found = cache.find("eu-vip", VpnProtocol::Udp).await.unwrap().unwrap();
        assert_eq!(found.path, udp);
        assert!(cache.find("eu-vip", VpnProtocol::Tcp).await.unwrap().is_some());
        assert!(cache.find("us-free", VpnProtocol::Tcp).await.unwrap().is_none());
    }
}
