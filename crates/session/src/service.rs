//! Host-facing facade over discovery and sessions.

use std::sync::Arc;

use tracing::info;

use castlink_connection::{ConnectionConfig, Dialer};
use castlink_discovery::{
    CycleOutcome, Device, DeviceRegistry, DiscoveryConfig, DiscoveryEngine, DiscoveryTransport,
};
use castlink_protocol::EventSink;

use crate::SessionError;
use crate::manager::SessionManager;
use crate::types::Session;

/// Discovery and casting behind the commands a host issues.
///
/// Hosts only ever hold device and session ids; every query returns a
/// snapshot.
pub struct CastService {
    registry: Arc<DeviceRegistry>,
    discovery: DiscoveryEngine,
    sessions: SessionManager,
}

impl CastService {
    pub fn new(
        transport: Arc<dyn DiscoveryTransport>,
        dialer: Arc<dyn Dialer>,
        sink: Arc<dyn EventSink>,
        discovery: DiscoveryConfig,
        connection: ConnectionConfig,
    ) -> Result<Self, SessionError> {
        let registry = Arc::new(DeviceRegistry::new());
        let discovery = DiscoveryEngine::new(transport, registry.clone(), sink.clone(), discovery)?;
        let sessions = SessionManager::new(registry.clone(), dialer, sink, connection)?;
        Ok(Self {
            registry,
            discovery,
            sessions,
        })
    }

    /// Starts periodic discovery. Fails if discovery is already running.
    pub fn start_discovery(&self) -> Result<(), SessionError> {
        Ok(self.discovery.start()?)
    }

    /// Stops discovery and forgets devices without a live session.
    pub fn stop_discovery(&self) {
        self.discovery.stop();
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_active()
    }

    pub fn get_devices(&self) -> Vec<Device> {
        self.registry.list()
    }

    /// Runs one discovery cycle now.
    pub async fn refresh_devices(&self) -> CycleOutcome {
        self.discovery.probe_once().await
    }

    pub async fn cast_media(&self, device_id: &str, media_url: &str) -> Result<Session, SessionError> {
        self.sessions.cast_media(device_id, media_url).await
    }

    pub async fn stop_casting(&self, session_id: &str) {
        self.sessions.stop_casting(session_id).await;
    }

    pub async fn play(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.play(session_id).await
    }

    pub async fn pause(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.pause(session_id).await
    }

    pub async fn seek(&self, session_id: &str, seconds: f64) -> Result<(), SessionError> {
        self.sessions.seek(session_id, seconds).await
    }

    pub async fn stop_media(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.stop_media(session_id).await
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.session(session_id)
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.sessions()
    }

    /// Ends every session and stops discovery.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
        self.discovery.stop();
        info!("cast service shut down");
    }
}
