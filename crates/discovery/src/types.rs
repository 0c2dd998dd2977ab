use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use castlink_protocol::constants::DEFAULT_CAST_PORT;
use castlink_protocol::events::{CastEvent, DeviceDiscovered};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::DiscoveryError;

/// Default interval between probe cycles.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Default time a probe waits for responses.
pub const DEFAULT_RESPONSE_WAIT: Duration = Duration::from_secs(3);

/// Default time after which an unconfirmed device is dropped.
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(30);

/// Receiver class reported when a response carries no model name.
pub const DEFAULT_DEVICE_TYPE: &str = "chromecast";

/// Availability of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Available,
    Connecting,
    Connected,
    Lost,
}

impl DeviceStatus {
    /// Returns true while a session holds the device.
    pub fn is_bound(&self) -> bool {
        matches!(self, DeviceStatus::Connecting | DeviceStatus::Connected)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Available => write!(f, "available"),
            DeviceStatus::Connecting => write!(f, "connecting"),
            DeviceStatus::Connected => write!(f, "connected"),
            DeviceStatus::Lost => write!(f, "lost"),
        }
    }
}

/// A candidate device parsed from one probe response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(skip)]
    pub addresses: Vec<IpAddr>,
}

impl DeviceRecord {
    /// Checks that the record carries a usable identity and address.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.id.trim().is_empty() {
            return Err(DiscoveryError::Malformed(format!("record for {} has no id", self.host)));
        }
        if self.host.trim().is_empty() {
            return Err(DiscoveryError::Malformed(format!("device {} has no host", self.id)));
        }
        if self.port == 0 {
            return Err(DiscoveryError::Malformed(format!("device {} has no port", self.id)));
        }
        Ok(())
    }
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.into()
}

fn default_port() -> u16 {
    DEFAULT_CAST_PORT
}

/// A receiver device tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub device_type: String,
    pub status: DeviceStatus,
    #[serde(skip)]
    pub addresses: Vec<IpAddr>,
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl Device {
    /// Creates an available device from a probe record.
    pub fn from_record(record: DeviceRecord, seen_at: Instant) -> Self {
        Self {
            id: record.id,
            name: record.name,
            host: record.host,
            port: record.port,
            device_type: record.device_type,
            status: DeviceStatus::Available,
            addresses: record.addresses,
            last_seen: Some(seen_at),
        }
    }

    /// Returns the `host:port` address of the receiver channel.
    pub fn address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]:{}", self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Returns true if the device hasn't been seen within `timeout` of `now`.
    pub fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        match self.last_seen {
            Some(last) => now.saturating_duration_since(last) > timeout,
            None => true,
        }
    }

    /// Builds the `device-discovered` event for this device.
    pub fn discovered_event(&self) -> CastEvent {
        CastEvent::DeviceDiscovered(DeviceDiscovered {
            device_id: self.id.clone(),
            device_name: self.name.clone(),
            device_type: self.device_type.clone(),
            host: self.host.clone(),
            port: self.port,
        })
    }
}
