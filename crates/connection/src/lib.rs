//! Cast v2 receiver channel for castlink.
//!
//! Provides dialers (TLS and plain TCP), the per-device connection with its
//! read, write and heartbeat pumps, the receiver app launch and media
//! transport controls.

pub mod config;
pub mod connection;
pub mod dialer;
pub(crate) mod pumps;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use config::ConnectionConfig;
pub use connection::{CastConnection, DeviceEndpoint, LossWatcher};
pub use dialer::{BoxedStream, CastStream, DialFuture, Dialer, TcpDialer, TlsDialer};

/// Errors from the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("connection refused by {0}")]
    Refused(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] castlink_protocol::ProtocolError),

    #[error("connection closed")]
    Closed,

    #[error("receiver error: {0}")]
    Receiver(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
