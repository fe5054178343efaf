use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use kdl::{KdlDocument, KdlValue};
use tracing::debug;

use crate::error::{HtbError, Result};
use crate::vpn_cache;

pub const DEFAULT_HOST: &str = "https://labs.hackthebox.com";
pub const TOKEN_ENV: &str = "HTB_TOKEN";
pub const HOST_ENV: &str = "HTB_BASE_URL";

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Versioned REST base selected per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    V4,
    V5,
}

impl ApiVersion {
    pub fn path_segment(self) -> &'static str {
        match self {
            ApiVersion::V4 => "v4",
            ApiVersion::V5 => "v5",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v4" | "4" => Ok(ApiVersion::V4),
            "v5" | "5" => Ok(ApiVersion::V5),
            other => Err(format!("unknown API version '{other}' (expected v4 or v5)")),
        }
    }
}

/// Returns the default config file location: `{XDG_CONFIG_HOME}/htbctl/config.kdl`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("htbctl")
        .join("config.kdl")
}

/// Process configuration: credential, API host and local paths.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: Option<String>,
    pub host: String,
    pub api_version: ApiVersion,
    pub vpn_dir: PathBuf,
    pub poll_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            host: DEFAULT_HOST.to_string(),
            api_version: ApiVersion::default(),
            vpn_dir: vpn_cache::cache_dir(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from the default config file, a `.env` file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration with `path` as the config file.
    ///
    /// Environment variables win over `.env`, which wins over the file. A missing
    /// file is not an error; a missing token is only reported by [`Config::require_token`].
    pub fn load_from(path: &Path) -> Result<Self> {
        // A missing .env is the common case
        let _ = dotenvy::dotenv();

        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "loading config file");
                Self::from_kdl(&text, &path.display().to_string())?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a KDL config document. Every node is optional.
    ///
    /// ```kdl
    /// token "abc123"
    /// api-version "v4"
    /// base-url "https://labs.hackthebox.com"
    /// vpn-dir "/home/me/.htbctl/vpn"
    /// poll-timeout 300
    /// ```
    pub fn from_kdl(text: &str, source_name: &str) -> Result<Self> {
        let doc: KdlDocument = text.parse().map_err(|e: kdl::KdlError| HtbError::ConfigParse {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        })?;

        let invalid = |detail: String| HtbError::ConfigParse {
            source_name: source_name.to_string(),
            detail,
        };

        let mut config = Self::default();
        if let Some(token) = string_arg(&doc, "token") {
            config.token = Some(token.to_string());
        }
        if let Some(version) = string_arg(&doc, "api-version") {
            config.api_version = version.parse().map_err(invalid)?;
        }
        if let Some(host) = string_arg(&doc, "base-url") {
            config.host = host.trim_end_matches('/').to_string();
        }
        if let Some(dir) = string_arg(&doc, "vpn-dir") {
            config.vpn_dir = PathBuf::from(dir);
        }
        if let Some(value) = doc.get_arg("poll-timeout") {
            let secs = value
                .as_integer()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| invalid(format!("poll-timeout must be a positive integer, got {value}")))?;
            config.poll_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.token = Some(token.trim().to_string());
        }
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().trim_end_matches('/').to_string();
        }
    }

    /// Base URL for `version`, e.g. `https://labs.hackthebox.com/api/v4`.
    pub fn base_url(&self, version: ApiVersion) -> String {
        format!("{}/api/{}", self.host, version.path_segment())
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(HtbError::MissingToken)
    }
}

fn string_arg<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get_arg(name).and_then(KdlValue::as_string)
}
