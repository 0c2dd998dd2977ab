//! JSON payloads carried in `CastMessage.payload_utf8`, grouped by namespace.
//!
//! Every payload is tagged by its `type` field. Responses the sender does not
//! understand deserialize to an `Unknown` variant instead of failing.

use serde::{Deserialize, Serialize};

/// `urn:x-cast:com.google.cast.tp.connection`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionMessage {
    Connect,
    Close,
    #[serde(other)]
    Unknown,
}

/// `urn:x-cast:com.google.cast.tp.heartbeat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatMessage {
    Ping,
    Pong,
    #[serde(other)]
    Unknown,
}

/// Requests sent on `urn:x-cast:com.google.cast.receiver`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ReceiverRequest {
    Launch { request_id: i64, app_id: String },
    Stop { request_id: i64, session_id: String },
    GetStatus { request_id: i64 },
}

/// Replies received on `urn:x-cast:com.google.cast.receiver`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ReceiverResponse {
    ReceiverStatus {
        #[serde(default)]
        request_id: i64,
        status: ReceiverStatus,
    },
    LaunchError {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    InvalidRequest {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ReceiverResponse {
    /// Returns the request id this reply correlates to (0 for broadcasts).
    pub fn request_id(&self) -> i64 {
        match self {
            ReceiverResponse::ReceiverStatus { request_id, .. }
            | ReceiverResponse::LaunchError { request_id, .. }
            | ReceiverResponse::InvalidRequest { request_id, .. } => *request_id,
            ReceiverResponse::Unknown => 0,
        }
    }
}

/// Receiver status body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl ReceiverStatus {
    /// Finds the running application with the given app id.
    pub fn application(&self, app_id: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.app_id == app_id)
    }
}

/// An application running on the receiver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub session_id: String,
    #[serde(default)]
    pub transport_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Application {
    /// Returns the destination id for app-level messages.
    pub fn transport(&self) -> &str {
        self.transport_id.as_deref().unwrap_or(&self.session_id)
    }
}

/// Media stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    Buffered,
    Live,
    Other,
}

/// Media description sent with `LOAD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInformation {
    pub content_id: String,
    pub content_type: String,
    pub stream_type: StreamType,
}

/// Requests sent on `urn:x-cast:com.google.cast.media`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MediaRequest {
    Load {
        request_id: i64,
        session_id: String,
        media: MediaInformation,
        autoplay: bool,
    },
    Play {
        request_id: i64,
        media_session_id: i64,
    },
    Pause {
        request_id: i64,
        media_session_id: i64,
    },
    Stop {
        request_id: i64,
        media_session_id: i64,
    },
    Seek {
        request_id: i64,
        media_session_id: i64,
        current_time: f64,
    },
}

/// Replies received on `urn:x-cast:com.google.cast.media`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MediaResponse {
    MediaStatus {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        status: Vec<MediaStatusEntry>,
    },
    LoadFailed {
        #[serde(default)]
        request_id: i64,
    },
    LoadCancelled {
        #[serde(default)]
        request_id: i64,
    },
    InvalidRequest {
        #[serde(default)]
        request_id: i64,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl MediaResponse {
    /// Returns the request id this reply correlates to (0 for broadcasts).
    pub fn request_id(&self) -> i64 {
        match self {
            MediaResponse::MediaStatus { request_id, .. }
            | MediaResponse::LoadFailed { request_id }
            | MediaResponse::LoadCancelled { request_id }
            | MediaResponse::InvalidRequest { request_id, .. } => *request_id,
            MediaResponse::Unknown => 0,
        }
    }
}

/// One media session entry of a `MEDIA_STATUS` reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatusEntry {
    pub media_session_id: i64,
    #[serde(default)]
    pub player_state: Option<String>,
    #[serde(default)]
    pub current_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_serializes_type_tag() {
        let json = serde_json::to_string(&HeartbeatMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"PONG"}"#);
        let parsed: HeartbeatMessage = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(parsed, HeartbeatMessage::Ping);
    }

    #[test]
    fn connection_ignores_extra_fields() {
        let parsed: ConnectionMessage =
            serde_json::from_str(r#"{"type":"CLOSE","reasonCode":5}"#).unwrap();
        assert_eq!(parsed, ConnectionMessage::Close);
    }

    #[test]
    fn launch_uses_camel_case_fields() {
        let req = ReceiverRequest::Launch {
            request_id: 7,
            app_id: "CC1AD845".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "LAUNCH");
        assert_eq!(value["requestId"], 7);
        assert_eq!(value["appId"], "CC1AD845");
    }

    #[test]
    fn receiver_status_parses_applications() {
        let json = r#"{
            "type": "RECEIVER_STATUS",
            "requestId": 3,
            "status": {
                "applications": [{
                    "appId": "CC1AD845",
                    "displayName": "Default Media Receiver",
                    "sessionId": "abc-123",
                    "transportId": "transport-9"
                }],
                "volume": {"level": 1.0}
            }
        }"#;
        let resp: ReceiverResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.request_id(), 3);
        let ReceiverResponse::ReceiverStatus { status, .. } = resp else {
            panic!("expected receiver status");
        };
        let app = status.application("CC1AD845").unwrap();
        assert_eq!(app.transport(), "transport-9");
    }

    #[test]
    fn application_transport_falls_back_to_session() {
        let app: Application =
            serde_json::from_str(r#"{"appId":"X","sessionId":"s-1"}"#).unwrap();
        assert_eq!(app.transport(), "s-1");
    }

    #[test]
    fn unknown_receiver_type_is_tolerated() {
        let resp: ReceiverResponse =
            serde_json::from_str(r#"{"type":"DEVICE_UPDATED","requestId":1}"#).unwrap();
        assert_eq!(resp, ReceiverResponse::Unknown);
        assert_eq!(resp.request_id(), 0);
    }

    #[test]
    fn load_request_shape() {
        let req = MediaRequest::Load {
            request_id: 2,
            session_id: "abc".into(),
            media: MediaInformation {
                content_id: "http://media/1.mp4".into(),
                content_type: "video/mp4".into(),
                stream_type: StreamType::Buffered,
            },
            autoplay: true,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "LOAD");
        assert_eq!(value["sessionId"], "abc");
        assert_eq!(value["media"]["contentId"], "http://media/1.mp4");
        assert_eq!(value["media"]["streamType"], "BUFFERED");
    }

    #[test]
    fn seek_carries_current_time() {
        let req = MediaRequest::Seek {
            request_id: 4,
            media_session_id: 1,
            current_time: 42.5,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["mediaSessionId"], 1);
        assert_eq!(value["currentTime"], 42.5);
    }

    #[test]
    fn media_status_parses_entries() {
        let json = r#"{"type":"MEDIA_STATUS","requestId":5,
            "status":[{"mediaSessionId":1,"playerState":"PLAYING","currentTime":3.2}]}"#;
        let resp: MediaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.request_id(), 5);
        let MediaResponse::MediaStatus { status, .. } = resp else {
            panic!("expected media status");
        };
        assert_eq!(status[0].media_session_id, 1);
        assert_eq!(status[0].player_state.as_deref(), Some("PLAYING"));
    }

    #[test]
    fn load_failed_parses() {
        let resp: MediaResponse =
            serde_json::from_str(r#"{"type":"LOAD_FAILED","requestId":9}"#).unwrap();
        assert_eq!(resp, MediaResponse::LoadFailed { request_id: 9 });
    }
}
