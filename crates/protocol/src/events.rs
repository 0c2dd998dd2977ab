//! Event records delivered to the host.
//!
//! Each record serializes to `{"event": <name>, "data": {...}}` where the
//! data object carries a fixed camelCase key set per event.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Payload of `device-discovered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDiscovered {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub host: String,
    pub port: u16,
}

/// Payload of `device-lost`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLost {
    pub device_id: String,
}

/// Payload of `session-started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: String,
    pub device_id: String,
}

/// Payload of `session-ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnded {
    pub session_id: String,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// A structured event emitted by the discovery engine or session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum CastEvent {
    DeviceDiscovered(DeviceDiscovered),
    DeviceLost(DeviceLost),
    SessionStarted(SessionStarted),
    SessionEnded(SessionEnded),
    Error(ErrorEvent),
}

impl CastEvent {
    pub fn device_lost(device_id: impl Into<String>) -> Self {
        CastEvent::DeviceLost(DeviceLost {
            device_id: device_id.into(),
        })
    }

    pub fn session_started(session_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        CastEvent::SessionStarted(SessionStarted {
            session_id: session_id.into(),
            device_id: device_id.into(),
        })
    }

    pub fn session_ended(session_id: impl Into<String>) -> Self {
        CastEvent::SessionEnded(SessionEnded {
            session_id: session_id.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        CastEvent::Error(ErrorEvent {
            message: message.into(),
        })
    }

    /// Returns the event name as seen by the host.
    pub fn name(&self) -> &'static str {
        match self {
            CastEvent::DeviceDiscovered(_) => "device-discovered",
            CastEvent::DeviceLost(_) => "device-lost",
            CastEvent::SessionStarted(_) => "session-started",
            CastEvent::SessionEnded(_) => "session-ended",
            CastEvent::Error(_) => "error",
        }
    }

    /// Returns the event data as a JSON object.
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            CastEvent::DeviceDiscovered(p) => serde_json::to_value(p),
            CastEvent::DeviceLost(p) => serde_json::to_value(p),
            CastEvent::SessionStarted(p) => serde_json::to_value(p),
            CastEvent::SessionEnded(p) => serde_json::to_value(p),
            CastEvent::Error(p) => serde_json::to_value(p),
        };
        // Plain structs of strings and integers always serialize.
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Receives event records. Any component that emits events takes one of these.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CastEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: CastEvent) {
        (**self).emit(event);
    }
}

/// Forwards events into a bounded channel without blocking.
impl EventSink for mpsc::Sender<CastEvent> {
    fn emit(&self, event: CastEvent) {
        if let Err(e) = self.try_send(event) {
            warn!("failed to deliver cast event: {e}");
        }
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(CastEvent) + Send + Sync,
{
    fn emit(&self, event: CastEvent) {
        (self.0)(event);
    }
}

/// Buffers events in memory for hosts that poll.
#[derive(Debug, Default)]
pub struct BufferSink {
    events: Mutex<Vec<CastEvent>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the buffered events.
    pub fn snapshot(&self) -> Vec<CastEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns all buffered events.
    pub fn drain(&self) -> Vec<CastEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for BufferSink {
    fn emit(&self, event: CastEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
