use std::time::Duration;

use castlink_protocol::constants::{
    DEFAULT_MEDIA_RECEIVER_APP_ID, HANDSHAKE_TIMEOUT, HEARTBEAT_INTERVAL, LAUNCH_TIMEOUT,
    LOAD_TIMEOUT, MAX_MISSED_HEARTBEATS,
};

use crate::ConnectionError;

/// Timing and app settings for receiver connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Covers dial, TLS and the first heartbeat round trip.
    pub handshake_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Unanswered pings tolerated before the connection is reported lost.
    pub max_missed_heartbeats: u32,
    pub launch_timeout: Duration,
    /// Also bounds media control requests.
    pub load_timeout: Duration,
    /// Receiver application launched for playback.
    pub app_id: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            max_missed_heartbeats: MAX_MISSED_HEARTBEATS,
            launch_timeout: LAUNCH_TIMEOUT,
            load_timeout: LOAD_TIMEOUT,
            app_id: DEFAULT_MEDIA_RECEIVER_APP_ID.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let invalid = |what: &str| Err(ConnectionError::Config(what.to_string()));
        if self.handshake_timeout.is_zero() {
            return invalid("handshake timeout must be positive");
        }
        if self.heartbeat_interval.is_zero() {
            return invalid("heartbeat interval must be positive");
        }
        if self.max_missed_heartbeats == 0 {
            return invalid("max missed heartbeats must be at least 1");
        }
        if self.app_id.trim().is_empty() {
            return invalid("app id is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_receiver_expectations() {
        let config = ConnectionConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.max_missed_heartbeats, 3);
        assert_eq!(config.launch_timeout, Duration::from_secs(8));
        assert_eq!(config.load_timeout, Duration::from_secs(10));
        assert_eq!(config.app_id, "CC1AD845");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_heartbeat() {
        let config = ConnectionConfig {
            heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConnectionError::Config(_))));
    }
}
