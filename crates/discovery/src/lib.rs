pub mod engine;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export primary types.
pub use engine::{CycleOutcome, DiscoveryConfig, DiscoveryEngine};
pub use registry::{DeviceRegistry, UpsertOutcome};
pub use transport::{
    CompositeTransport, DiscoveryTransport, ManualTransport, MdnsTransport, ProbeFuture,
    ProbeReply, SsdpTransport,
};
pub use types::{
    DEFAULT_PROBE_INTERVAL, DEFAULT_RESPONSE_WAIT, DEFAULT_STALE_TIMEOUT, Device, DeviceRecord,
    DeviceStatus,
};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Cast discovery is already active")]
    AlreadyActive,

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("mDNS error: {0}")]
    Mdns(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed probe response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
