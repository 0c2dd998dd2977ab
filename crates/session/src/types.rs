use std::fmt;

use serde::Serialize;

/// Lifecycle state of a cast session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Pending,
    Active,
    Ended,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ended => write!(f, "ended"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a cast session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
    pub media_url: String,
    pub state: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_shape() {
        let session = Session {
            session_id: "s1".into(),
            device_id: "d1".into(),
            media_url: "http://media/1.mp4".into(),
            state: SessionState::Active,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["state"], "active");
    }
}
