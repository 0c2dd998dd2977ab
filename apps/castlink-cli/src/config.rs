//! castlink configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/castlink/castlink.toml`
//! - Windows: `%APPDATA%/castlink/castlink.toml`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use castlink_connection::ConnectionConfig;
use castlink_discovery::{
    CompositeTransport, DeviceRecord, DiscoveryConfig, DiscoveryTransport, ManualTransport,
    MdnsTransport, SsdpTransport,
};

/// A discovery transport that can be enabled in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mdns,
    Ssdp,
    Manual,
}

/// castlink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Discovery transports to probe with.
    #[serde(default = "default_transports")]
    pub transports: Vec<TransportKind>,

    /// Seconds between probe cycles.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Seconds each probe waits for replies.
    #[serde(default = "default_response_wait")]
    pub response_wait_secs: u64,

    /// Seconds after which an unconfirmed device is dropped.
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: u64,

    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Accept the self-signed certificates Cast receivers present.
    #[serde(default = "default_true")]
    pub insecure_tls: bool,

    /// Receivers announced by the manual transport.
    #[serde(default)]
    pub manual_devices: Vec<DeviceRecord>,
}

fn default_transports() -> Vec<TransportKind> {
    vec![TransportKind::Mdns, TransportKind::Manual]
}

fn default_probe_interval() -> u64 {
    5
}

fn default_response_wait() -> u64 {
    3
}

fn default_stale_timeout() -> u64 {
    30
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transports: default_transports(),
            probe_interval_secs: default_probe_interval(),
            response_wait_secs: default_response_wait(),
            stale_timeout_secs: default_stale_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            insecure_tls: default_true(),
            manual_devices: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or the platform default location.
    ///
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            probe_interval: Duration::from_secs(self.probe_interval_secs),
            response_wait: Duration::from_secs(self.response_wait_secs),
            stale_timeout: Duration::from_secs(self.stale_timeout_secs),
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            ..ConnectionConfig::default()
        }
    }

    /// Builds the discovery transport from the enabled kinds.
    pub fn transport(&self) -> anyhow::Result<Arc<dyn DiscoveryTransport>> {
        let mut transports: Vec<Arc<dyn DiscoveryTransport>> = Vec::new();
        for kind in &self.transports {
            match kind {
                TransportKind::Mdns => transports.push(Arc::new(MdnsTransport::new())),
                TransportKind::Ssdp => transports.push(Arc::new(SsdpTransport::new())),
                TransportKind::Manual => {
                    transports.push(Arc::new(ManualTransport::new(self.manual_devices.clone())))
                }
            }
        }
        let composite = CompositeTransport::new(transports);
        anyhow::ensure!(!composite.is_empty(), "no discovery transports enabled");
        Ok(Arc::new(composite))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("castlink")
            .join("castlink.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("castlink").join("castlink.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/castlink/castlink.toml"))
    }
}
