//! Session manager binding media casts to receiver connections.
//!
//! Each live session owns at most one [`CastConnection`]. Casts to the same
//! device are serialized by a per-device lock; a new cast ends the device's
//! previous session before its own connection is opened. Sessions leave the
//! table as soon as they reach a terminal state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use castlink_connection::{CastConnection, ConnectionConfig, ConnectionError, DeviceEndpoint, Dialer};
use castlink_discovery::{DeviceRegistry, DeviceStatus};
use castlink_protocol::{CastEvent, EventSink};

use crate::SessionError;
use crate::id::SessionIdGenerator;
use crate::types::{Session, SessionState};

/// How a live session came to an end.
enum Ending {
    Stopped,
    Failed(String),
    /// Raised by the session's own loss watcher.
    Lost(String),
}

struct Entry {
    session: Session,
    connection: Option<Arc<CastConnection>>,
    watcher: Option<JoinHandle<()>>,
    /// Cancels an in-flight connect when the session ends while pending.
    cancel: CancellationToken,
}

type DeviceLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// A holder of one device's cast lock. The table entry is dropped with the
/// last holder.
struct DeviceSlot<'a> {
    locks: &'a DeviceLocks,
    device_id: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for DeviceSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Holders clone the entry under the table lock: two references means
        // this slot and the table.
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.device_id)
                .is_some_and(|l| Arc::ptr_eq(l, &self.lock))
        {
            locks.remove(&self.device_id);
        }
    }
}

struct Inner {
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn EventSink>,
    dialer: Arc<dyn Dialer>,
    config: ConnectionConfig,
    ids: SessionIdGenerator,
    sessions: Mutex<HashMap<String, Entry>>,
    device_locks: DeviceLocks,
}

/// Owns cast sessions and their connections.
///
/// Lifecycle events are emitted while the session table is locked, so an
/// [`EventSink`] must not call back into the manager.
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        dialer: Arc<dyn Dialer>,
        sink: Arc<dyn EventSink>,
        config: ConnectionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                sink,
                dialer,
                config,
                ids: SessionIdGenerator::new(),
                sessions: Mutex::new(HashMap::new()),
                device_locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Casts `media_url` to a registered device.
    ///
    /// Returns the session once it is active. If the connection or the load
    /// fails, the session is failed (`error` then `session-ended`) and the
    /// error is returned as well. A session stopped while still connecting is
    /// returned in the `ended` state.
    pub async fn cast_media(
        &self,
        device_id: &str,
        media_url: &str,
    ) -> Result<Session, SessionError> {
        if device_id.trim().is_empty() {
            return Err(SessionError::InvalidArgument("device id is empty".into()));
        }
        if media_url.trim().is_empty() {
            return Err(SessionError::InvalidArgument("media url is empty".into()));
        }
        let device = self
            .inner
            .registry
            .get(device_id)
            .map_err(|_| SessionError::DeviceNotFound(device_id.to_string()))?;

        let slot = self.inner.device_slot(device_id);
        let _guard = slot.lock.lock().await;

        for previous in self.inner.live_for_device(device_id) {
            info!(device = %device_id, session = %previous, "replacing session");
            self.inner.finish(&previous, Ending::Stopped).await;
        }

        let session = Session {
            session_id: self.inner.ids.next(device_id),
            device_id: device_id.to_string(),
            media_url: media_url.to_string(),
            state: SessionState::Pending,
        };
        let cancel = CancellationToken::new();
        self.inner.sessions().insert(
            session.session_id.clone(),
            Entry {
                session: session.clone(),
                connection: None,
                watcher: None,
                cancel: cancel.clone(),
            },
        );
        self.inner.registry.set_status(device_id, DeviceStatus::Connecting);
        info!(session = %session.session_id, device = %device_id, url = %media_url, "session pending");

        let endpoint = DeviceEndpoint::new(&device.id, &device.host, device.port);
        let result = tokio::select! {
            r = self.inner.connect(endpoint, media_url) => Some(r),
            _ = cancel.cancelled() => None,
        };

        match result {
            Some(Ok(conn)) => Ok(Inner::activate(&self.inner, session, Arc::new(conn)).await),
            Some(Err(e)) => {
                let message = format!("cast to {device_id} failed: {e}");
                self.inner.finish(&session.session_id, Ending::Failed(message)).await;
                Err(e.into())
            }
            None => {
                debug!(session = %session.session_id, "session stopped while connecting");
                Ok(Session {
                    state: SessionState::Ended,
                    ..session
                })
            }
        }
    }

    /// Ends a session. Empty or unknown ids are ignored.
    pub async fn stop_casting(&self, session_id: &str) {
        if session_id.trim().is_empty() {
            return;
        }
        if self.inner.finish(session_id, Ending::Stopped).await.is_none() {
            debug!(session = %session_id, "stop for unknown session ignored");
        }
    }

    pub async fn play(&self, session_id: &str) -> Result<(), SessionError> {
        Ok(self.inner.connection(session_id)?.play().await?)
    }

    pub async fn pause(&self, session_id: &str) -> Result<(), SessionError> {
        Ok(self.inner.connection(session_id)?.pause().await?)
    }

    /// Seeks to `seconds` from the start of the media.
    pub async fn seek(&self, session_id: &str, seconds: f64) -> Result<(), SessionError> {
        Ok(self.inner.connection(session_id)?.seek(seconds).await?)
    }

    /// Stops playback without ending the session.
    pub async fn stop_media(&self, session_id: &str) -> Result<(), SessionError> {
        Ok(self.inner.connection(session_id)?.stop_media().await?)
    }

    /// Snapshot of a live session.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.inner
            .sessions()
            .get(session_id)
            .map(|e| e.session.clone())
    }

    /// Snapshots of all live sessions.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner
            .sessions()
            .values()
            .map(|e| e.session.clone())
            .collect()
    }

    /// The live session bound to a device, if any.
    pub fn active_session_for(&self, device_id: &str) -> Option<Session> {
        self.inner
            .sessions()
            .values()
            .find(|e| e.session.device_id == device_id)
            .map(|e| e.session.clone())
    }

    /// Ends every live session.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.inner.sessions().keys().cloned().collect();
        for id in &ids {
            self.inner.finish(id, Ending::Stopped).await;
        }
        info!(ended = ids.len(), "session manager shut down");
    }
}

impl Inner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device_slot(&self, device_id: &str) -> DeviceSlot<'_> {
        let lock = self
            .device_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device_id.to_string())
            .or_default()
            .clone();
        DeviceSlot {
            locks: &self.device_locks,
            device_id: device_id.to_string(),
            lock,
        }
    }

    fn live_for_device(&self, device_id: &str) -> Vec<String> {
        self.sessions()
            .values()
            .filter(|e| e.session.device_id == device_id)
            .map(|e| e.session.session_id.clone())
            .collect()
    }

    fn connection(&self, session_id: &str) -> Result<Arc<CastConnection>, SessionError> {
        self.sessions()
            .get(session_id)
            .filter(|e| e.session.state == SessionState::Active)
            .and_then(|e| e.connection.clone())
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    /// Opens the channel and loads the media.
    async fn connect(
        &self,
        endpoint: DeviceEndpoint,
        media_url: &str,
    ) -> Result<CastConnection, ConnectionError> {
        let conn = CastConnection::open(endpoint, self.dialer.as_ref(), self.config.clone()).await?;
        if let Err(e) = conn.load(media_url).await {
            conn.close().await;
            return Err(e);
        }
        Ok(conn)
    }

    /// Moves a pending session to active and starts watching for loss.
    async fn activate(this: &Arc<Self>, mut session: Session, conn: Arc<CastConnection>) -> Session {
        {
            let mut sessions = this.sessions();
            if let Some(entry) = sessions
                .get_mut(&session.session_id)
                .filter(|e| e.session.state == SessionState::Pending)
            {
                entry.session.state = SessionState::Active;
                entry.connection = Some(conn.clone());
                entry.watcher = Some(tokio::spawn(watch_loss(
                    Arc::downgrade(this),
                    session.session_id.clone(),
                    conn.clone(),
                )));
                this.registry
                    .set_status(&session.device_id, DeviceStatus::Connected);
                this.sink.emit(CastEvent::session_started(
                    &session.session_id,
                    &session.device_id,
                ));
                session.state = SessionState::Active;
            } else {
                session.state = SessionState::Ended;
            }
        }

        if session.state == SessionState::Active {
            info!(session = %session.session_id, device = %session.device_id, "session started");
        } else {
            debug!(session = %session.session_id, "session ended before activation");
            conn.close().await;
        }
        session
    }

    /// Takes a live session out of the table, reports its end and releases
    /// its connection. Returns `None` if the session was not live.
    async fn finish(&self, session_id: &str, ending: Ending) -> Option<Session> {
        let mut entry = {
            let mut sessions = self.sessions();
            let mut entry = sessions.remove(session_id)?;
            entry.session.state = match ending {
                Ending::Stopped => SessionState::Ended,
                Ending::Failed(_) | Ending::Lost(_) => SessionState::Failed,
            };
            self.registry
                .set_status(&entry.session.device_id, DeviceStatus::Available);
            if let Ending::Failed(message) | Ending::Lost(message) = &ending {
                self.sink.emit(CastEvent::error(message.clone()));
            }
            self.sink.emit(CastEvent::session_ended(session_id));
            entry
        };

        entry.cancel.cancel();
        if let Some(watcher) = entry.watcher.take() {
            if !matches!(ending, Ending::Lost(_)) {
                watcher.abort();
            }
        }
        if let Some(conn) = entry.connection.take() {
            conn.close().await;
        }

        match &ending {
            Ending::Stopped => info!(session = %session_id, "session ended"),
            Ending::Failed(message) | Ending::Lost(message) => {
                warn!(session = %session_id, error = %message, "session failed");
            }
        }
        Some(entry.session)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for entry in self.sessions().values() {
            entry.cancel.cancel();
            if let Some(watcher) = &entry.watcher {
                watcher.abort();
            }
        }
    }
}

async fn watch_loss(inner: Weak<Inner>, session_id: String, conn: Arc<CastConnection>) {
    let mut watcher = conn.loss_watcher();
    let device_id = conn.endpoint().device_id.clone();
    drop(conn);

    let reason = watcher.lost().await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let message = format!("lost connection to {device_id}: {reason}");
    inner.finish(&session_id, Ending::Lost(message)).await;
}
