//! Cast session lifecycle for castlink.
//!
//! [`SessionManager`] binds one media URL to one receiver device over a
//! [`castlink_connection::CastConnection`] and reports the lifecycle as
//! events. [`CastService`] puts discovery and sessions behind the commands
//! a host issues.

pub mod id;
pub mod manager;
pub mod service;
pub mod types;

pub use id::SessionIdGenerator;
pub use manager::SessionManager;
pub use service::CastService;
pub use types::{Session, SessionState};

use castlink_connection::ConnectionError;
use castlink_discovery::DiscoveryError;

/// Errors for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("no active session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
