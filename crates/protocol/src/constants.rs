use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::ProtocolError;

/// Default TCP port of the Cast v2 receiver channel.
pub const DEFAULT_CAST_PORT: u16 = 8009;

/// mDNS service type advertised by Cast receivers.
pub const CAST_SERVICE_NAME: &str = "_googlecast._tcp";

/// DIAL search target used for SSDP discovery.
pub const DIAL_SEARCH_TARGET: &str = "urn:dial-multiscreen-org:service:dial:1";

/// Source id used by this sender on every message.
pub const SENDER_ID: &str = "sender-0";

/// Platform receiver id (before an app is launched).
pub const RECEIVER_ID: &str = "receiver-0";

/// App id of the Default Media Receiver.
pub const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";

/// `CastMessage.protocol_version` value for CASTV2_1_0.
pub const PROTOCOL_VERSION_CASTV2_1_0: u64 = 0;

/// `CastMessage.payload_type` value for string payloads.
pub const PAYLOAD_TYPE_STRING: u64 = 0;

/// Maximum Cast message body size in bytes (64 KiB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Time allowed for dialing and the channel handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often heartbeat pings are sent on an open channel.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive unanswered pings before the connection is declared lost.
pub const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Time to wait for `RECEIVER_STATUS` after `LAUNCH`.
pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Time to wait for `MEDIA_STATUS` after `LOAD`.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Cast v2 namespace carried in `CastMessage.namespace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Connection,
    Heartbeat,
    Receiver,
    Media,
}

impl Namespace {
    /// Returns the URN string for this namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Connection => "urn:x-cast:com.google.cast.tp.connection",
            Namespace::Heartbeat => "urn:x-cast:com.google.cast.tp.heartbeat",
            Namespace::Receiver => "urn:x-cast:com.google.cast.receiver",
            Namespace::Media => "urn:x-cast:com.google.cast.media",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urn:x-cast:com.google.cast.tp.connection" => Ok(Namespace::Connection),
            "urn:x-cast:com.google.cast.tp.heartbeat" => Ok(Namespace::Heartbeat),
            "urn:x-cast:com.google.cast.receiver" => Ok(Namespace::Receiver),
            "urn:x-cast:com.google.cast.media" => Ok(Namespace::Media),
            other => Err(ProtocolError::UnknownNamespace(other.to_string())),
        }
    }
}
