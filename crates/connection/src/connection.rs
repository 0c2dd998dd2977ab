//! A live Cast v2 channel to one receiver.
//!
//! Implements request/response correlation over `requestId`, the
//! CONNECT + PING handshake, heartbeat supervision and the receiver app
//! launch that media commands are addressed to.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use castlink_protocol::constants::{RECEIVER_ID, SENDER_ID};
use castlink_protocol::media::media_for_url;
use castlink_protocol::messages::{
    ConnectionMessage, HeartbeatMessage, MediaRequest, MediaResponse, ReceiverRequest,
    ReceiverResponse,
};
use castlink_protocol::{CastMessage, Namespace};

use crate::ConnectionError;
use crate::config::ConnectionConfig;
use crate::dialer::{BoxedStream, Dialer};
use crate::pumps::heartbeat::{HeartbeatState, heartbeat_pump};
use crate::pumps::read::{ReadContext, read_pump};
use crate::pumps::write::write_pump;

/// Upper bound on flushing CLOSE frames during [`CastConnection::close`].
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound queue depth.
const WRITE_QUEUE: usize = 64;

/// Frames and control items for the write pump.
pub(crate) enum Outbound {
    Frame(CastMessage),
    /// Acknowledged once every frame queued before it has been written.
    Flush(oneshot::Sender<()>),
}

/// A correlated reply.
#[derive(Debug)]
pub(crate) enum Reply {
    Receiver(ReceiverResponse),
    Media(MediaResponse),
}

pub(crate) type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Reply>>>>;

/// Set once, by whichever pump first notices the connection is gone.
#[derive(Clone)]
pub(crate) struct LossSignal(Arc<watch::Sender<Option<String>>>);

impl LossSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self(Arc::new(tx))
    }

    pub(crate) fn raise(&self, reason: String) {
        self.0.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn watcher(&self) -> LossWatcher {
        LossWatcher(self.0.subscribe())
    }
}

/// Observes the loss of a connection.
#[derive(Clone)]
pub struct LossWatcher(watch::Receiver<Option<String>>);

impl LossWatcher {
    /// Completes once the connection is lost, with the reason.
    pub async fn lost(&mut self) -> String {
        match self.0.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone().unwrap_or_default(),
            Err(_) => "connection dropped".to_string(),
        }
    }

    /// The loss reason, if the connection has been lost.
    pub fn reason(&self) -> Option<String> {
        self.0.borrow().clone()
    }
}

/// Where a receiver listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub device_id: String,
    pub host: String,
    pub port: u16,
}

impl DeviceEndpoint {
    pub fn new(device_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            device_id: device_id.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
struct AppSession {
    session_id: String,
    transport_id: String,
}

/// An open channel to a receiver with the media app launched.
///
/// Dropping the connection cancels all pumps; [`close`](Self::close) also
/// says goodbye to the receiver first.
pub struct CastConnection {
    endpoint: DeviceEndpoint,
    config: ConnectionConfig,
    write_tx: mpsc::Sender<Outbound>,
    pending: PendingMap,
    next_request_id: AtomicI64,
    heartbeat: Arc<HeartbeatState>,
    loss: LossSignal,
    app: std::sync::Mutex<Option<AppSession>>,
    media_session_id: std::sync::Mutex<Option<i64>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    read_handle: JoinHandle<()>,
    write_handle: JoinHandle<()>,
    heartbeat_handle: JoinHandle<()>,
}

impl CastConnection {
    /// Dials the receiver, performs the handshake and launches the
    /// configured receiver app.
    ///
    /// The handshake (dial, TLS, CONNECT and the first PING/PONG) is bounded
    /// by `handshake_timeout`; the launch by `launch_timeout`.
    pub async fn open(
        endpoint: DeviceEndpoint,
        dialer: &dyn Dialer,
        config: ConnectionConfig,
    ) -> Result<Self, ConnectionError> {
        config.validate()?;
        let addr = endpoint.to_string();
        let timeout = config.handshake_timeout;

        let conn = tokio::time::timeout(timeout, Self::handshake(endpoint, dialer, config))
            .await
            .map_err(|_| ConnectionError::Timeout(format!("handshake with {addr}")))??;
        info!(device = %conn.endpoint.device_id, %addr, "receiver channel open");

        if let Err(e) = conn.launch().await {
            conn.close().await;
            return Err(e);
        }
        Ok(conn)
    }

    async fn handshake(
        endpoint: DeviceEndpoint,
        dialer: &dyn Dialer,
        config: ConnectionConfig,
    ) -> Result<Self, ConnectionError> {
        let stream = dialer.dial(&endpoint.host, endpoint.port).await?;
        let conn = Self::start(endpoint, stream, config);

        conn.send(RECEIVER_ID, Namespace::Connection, &ConnectionMessage::Connect)
            .await?;
        conn.heartbeat.ping_sent();
        conn.send(RECEIVER_ID, Namespace::Heartbeat, &HeartbeatMessage::Ping)
            .await?;

        let mut watcher = conn.loss_watcher();
        tokio::select! {
            _ = conn.heartbeat.pong() => {}
            reason = watcher.lost() => {
                return Err(ConnectionError::Receiver(format!("handshake failed: {reason}")));
            }
        }
        debug!(device = %conn.endpoint.device_id, "handshake complete");
        Ok(conn)
    }

    /// Spawns the pumps over an established stream.
    fn start(endpoint: DeviceEndpoint, stream: BoxedStream, config: ConnectionConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let heartbeat = Arc::new(HeartbeatState::default());
        let loss = LossSignal::new();
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(write_pump(writer, write_rx, loss.clone(), cancel.clone()));

        let read_handle = {
            let ctx = ReadContext {
                pending: pending.clone(),
                write_tx: write_tx.clone(),
                heartbeat: heartbeat.clone(),
                loss: loss.clone(),
            };
            tokio::spawn(read_pump(reader, ctx, cancel.clone()))
        };

        let heartbeat_handle = tokio::spawn(heartbeat_pump(
            write_tx.clone(),
            heartbeat.clone(),
            loss.clone(),
            config.heartbeat_interval,
            config.max_missed_heartbeats,
            cancel.clone(),
        ));

        Self {
            endpoint,
            config,
            write_tx,
            pending,
            next_request_id: AtomicI64::new(1),
            heartbeat,
            loss,
            app: std::sync::Mutex::new(None),
            media_session_id: std::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
            cancel,
            read_handle,
            write_handle,
            heartbeat_handle,
        }
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Returns a watcher that completes when the connection is lost.
    pub fn loss_watcher(&self) -> LossWatcher {
        self.loss.watcher()
    }

    /// True once closed locally or lost.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Destination id of the launched receiver app.
    pub fn transport_id(&self) -> Option<String> {
        self.app_slot().as_ref().map(|a| a.transport_id.clone())
    }

    /// Media session id assigned by the last successful load.
    pub fn media_session_id(&self) -> Option<i64> {
        *self
            .media_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn app_slot(&self) -> std::sync::MutexGuard<'_, Option<AppSession>> {
        self.app.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn app_session(&self) -> Result<AppSession, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.app_slot()
            .clone()
            .ok_or_else(|| ConnectionError::Receiver("no receiver app running".into()))
    }

    fn set_media_session(&self, id: i64) {
        *self
            .media_session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    async fn send<T: Serialize>(
        &self,
        destination: &str,
        namespace: Namespace,
        payload: &T,
    ) -> Result<(), ConnectionError> {
        let msg = CastMessage::json(SENDER_ID, destination, namespace, payload)?;
        self.write_tx
            .send(Outbound::Frame(msg))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Sends a request and waits for the reply carrying the same id.
    async fn request<T: Serialize>(
        &self,
        destination: &str,
        namespace: Namespace,
        timeout: Duration,
        what: &str,
        build: impl FnOnce(i64) -> T,
    ) -> Result<Reply, ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let payload = build(id);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send(destination, namespace, &payload).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let result = tokio::time::timeout(timeout, rx).await;

        // Clean up pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ConnectionError::Closed),
            Err(_) => Err(ConnectionError::Timeout(format!(
                "{what} reply from {}",
                self.endpoint.device_id
            ))),
        }
    }

    /// Launches the configured app and connects to its transport.
    async fn launch(&self) -> Result<(), ConnectionError> {
        let app_id = self.config.app_id.clone();
        let reply = self
            .request(
                RECEIVER_ID,
                Namespace::Receiver,
                self.config.launch_timeout,
                "launch",
                |request_id| ReceiverRequest::Launch {
                    request_id,
                    app_id: app_id.clone(),
                },
            )
            .await?;

        let status = match reply {
            Reply::Receiver(ReceiverResponse::ReceiverStatus { status, .. }) => status,
            Reply::Receiver(ReceiverResponse::LaunchError { reason, .. })
            | Reply::Receiver(ReceiverResponse::InvalidRequest { reason, .. }) => {
                return Err(ConnectionError::Receiver(format!(
                    "launch of {app_id} failed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                )));
            }
            other => {
                return Err(ConnectionError::Receiver(format!(
                    "unexpected launch reply: {other:?}"
                )));
            }
        };

        let app = status
            .application(&app_id)
            .ok_or_else(|| ConnectionError::Receiver(format!("{app_id} not running after launch")))?;
        let session = AppSession {
            session_id: app.session_id.clone(),
            transport_id: app.transport().to_string(),
        };

        self.send(&session.transport_id, Namespace::Connection, &ConnectionMessage::Connect)
            .await?;
        info!(
            device = %self.endpoint.device_id,
            app = %app_id,
            transport = %session.transport_id,
            "receiver app launched"
        );
        *self.app_slot() = Some(session);
        Ok(())
    }

    /// Loads `media_url` into the launched app and starts playback.
    ///
    /// Returns the media session id assigned by the receiver.
    pub async fn load(&self, media_url: &str) -> Result<i64, ConnectionError> {
        let app = self.app_session()?;
        let media = media_for_url(media_url);
        let reply = self
            .request(
                &app.transport_id,
                Namespace::Media,
                self.config.load_timeout,
                "load",
                |request_id| MediaRequest::Load {
                    request_id,
                    session_id: app.session_id.clone(),
                    media,
                    autoplay: true,
                },
            )
            .await?;

        let id = media_status(reply, "load")?
            .ok_or_else(|| ConnectionError::Receiver("load returned no media session".into()))?;
        self.set_media_session(id);
        info!(device = %self.endpoint.device_id, media_session = id, "media loaded");
        Ok(id)
    }

    pub async fn play(&self) -> Result<(), ConnectionError> {
        self.control("play", |request_id, media_session_id| MediaRequest::Play {
            request_id,
            media_session_id,
        })
        .await
    }

    pub async fn pause(&self) -> Result<(), ConnectionError> {
        self.control("pause", |request_id, media_session_id| MediaRequest::Pause {
            request_id,
            media_session_id,
        })
        .await
    }

    /// Stops playback. The receiver app keeps running.
    pub async fn stop_media(&self) -> Result<(), ConnectionError> {
        self.control("stop", |request_id, media_session_id| MediaRequest::Stop {
            request_id,
            media_session_id,
        })
        .await
    }

    /// Seeks to `seconds` from the start of the media.
    pub async fn seek(&self, seconds: f64) -> Result<(), ConnectionError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ConnectionError::Receiver(format!("invalid seek position {seconds}")));
        }
        self.control("seek", |request_id, media_session_id| MediaRequest::Seek {
            request_id,
            media_session_id,
            current_time: seconds,
        })
        .await
    }

    async fn control(
        &self,
        what: &str,
        build: impl FnOnce(i64, i64) -> MediaRequest,
    ) -> Result<(), ConnectionError> {
        let app = self.app_session()?;
        let media_session_id = self
            .media_session_id()
            .ok_or_else(|| ConnectionError::Receiver("no media loaded".into()))?;
        let reply = self
            .request(
                &app.transport_id,
                Namespace::Media,
                self.config.load_timeout,
                what,
                |request_id| build(request_id, media_session_id),
            )
            .await?;
        if let Some(id) = media_status(reply, what)? {
            self.set_media_session(id);
        }
        debug!(device = %self.endpoint.device_id, command = what, "media command acknowledged");
        Ok(())
    }

    /// Says goodbye to the receiver and releases the stream. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if !self.cancel.is_cancelled() {
            let app = self.app_slot().take();
            let drained = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, async {
                if let Some(app) = app {
                    let _ = self
                        .send(&app.transport_id, Namespace::Connection, &ConnectionMessage::Close)
                        .await;
                }
                let _ = self
                    .send(RECEIVER_ID, Namespace::Connection, &ConnectionMessage::Close)
                    .await;
                let (tx, rx) = oneshot::channel();
                if self.write_tx.send(Outbound::Flush(tx)).await.is_ok() {
                    let _ = rx.await;
                }
            })
            .await;
            if drained.is_err() {
                debug!(device = %self.endpoint.device_id, "timed out flushing CLOSE");
            }
        }

        self.cancel.cancel();
        info!(device = %self.endpoint.device_id, "receiver channel closed");
    }
}

impl Drop for CastConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.write_handle.abort();
        self.heartbeat_handle.abort();
    }
}

/// Interprets a media reply. Returns the media session id if one is reported.
fn media_status(reply: Reply, what: &str) -> Result<Option<i64>, ConnectionError> {
    match reply {
        Reply::Media(MediaResponse::MediaStatus { status, .. }) => {
            Ok(status.first().map(|s| s.media_session_id))
        }
        Reply::Media(MediaResponse::LoadFailed { .. }) => {
            Err(ConnectionError::Receiver(format!("{what} failed")))
        }
        Reply::Media(MediaResponse::LoadCancelled { .. }) => {
            Err(ConnectionError::Receiver(format!("{what} cancelled")))
        }
        Reply::Media(MediaResponse::InvalidRequest { reason, .. }) => Err(ConnectionError::Receiver(
            format!("{what} rejected: {}", reason.as_deref().unwrap_or("no reason given")),
        )),
        other => Err(ConnectionError::Receiver(format!(
            "unexpected {what} reply: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDialer, LaunchBehavior, LoadBehavior, PongPolicy, ReceiverScript};

    fn endpoint() -> DeviceEndpoint {
        DeviceEndpoint::new("d1", "192.168.1.50", 8009)
    }

    async fn open(dialer: &FakeDialer) -> Result<CastConnection, ConnectionError> {
        CastConnection::open(endpoint(), dialer, ConnectionConfig::default()).await
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(endpoint().to_string(), "192.168.1.50:8009");
        assert_eq!(DeviceEndpoint::new("x", "fe80::1", 8009).to_string(), "[fe80::1]:8009");
    }

    #[tokio::test(start_paused = true)]
    async fn open_handshakes_and_launches() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        let conn = open(&dialer).await.unwrap();
        assert_eq!(conn.transport_id().as_deref(), Some("web-7"));
        conn.close().await;

        let receiver = dialer.last_receiver().unwrap();
        receiver.wait_for_hangup().await;
        let sent = receiver.payload_types();
        assert_eq!(
            sent[1],
            (Namespace::Heartbeat, "PING".to_string(), RECEIVER_ID.to_string())
        );

        let channel: Vec<(String, String)> = sent
            .into_iter()
            .filter(|(ns, _, _)| *ns != Namespace::Heartbeat)
            .map(|(_, t, dest)| (t, dest))
            .collect();
        let expected = [
            ("CONNECT", RECEIVER_ID),
            ("LAUNCH", RECEIVER_ID),
            ("CONNECT", "web-7"),
            ("CLOSE", "web-7"),
            ("CLOSE", RECEIVER_ID),
        ]
        .map(|(t, d)| (t.to_string(), d.to_string()));
        assert_eq!(channel, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_dial_is_refused_error() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        dialer.set_refuse(true);
        assert!(matches!(open(&dialer).await, Err(ConnectionError::Refused(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_receiver_times_out_handshake() {
        let dialer = FakeDialer::new(ReceiverScript {
            pongs: PongPolicy::Never,
            ..Default::default()
        });
        let err = open(&dialer).await.err().unwrap();
        assert!(matches!(err, ConnectionError::Timeout(what) if what.contains("handshake")));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_dial_times_out() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        dialer.set_hang(true);
        assert!(matches!(open(&dialer).await, Err(ConnectionError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_error_surfaces_as_receiver_error() {
        let dialer = FakeDialer::new(ReceiverScript {
            launch: LaunchBehavior::Fail,
            ..Default::default()
        });
        let err = open(&dialer).await.err().unwrap();
        assert!(matches!(err, ConnectionError::Receiver(msg) if msg.contains("launch")));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_launch_times_out() {
        let dialer = FakeDialer::new(ReceiverScript {
            launch: LaunchBehavior::Ignore,
            ..Default::default()
        });
        let err = open(&dialer).await.err().unwrap();
        assert!(matches!(err, ConnectionError::Timeout(what) if what.contains("launch")));
    }

    #[tokio::test(start_paused = true)]
    async fn load_and_controls() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        let conn = open(&dialer).await.unwrap();

        assert!(matches!(conn.play().await, Err(ConnectionError::Receiver(_))));

        let id = conn.load("http://media/1.mp4").await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(conn.media_session_id(), Some(1));

        conn.pause().await.unwrap();
        conn.play().await.unwrap();
        conn.seek(42.5).await.unwrap();
        conn.stop_media().await.unwrap();
        assert!(conn.seek(-1.0).await.is_err());

        let receiver = dialer.last_receiver().unwrap();
        let media: Vec<String> = receiver
            .payload_types()
            .into_iter()
            .filter(|(ns, _, _)| *ns == Namespace::Media)
            .map(|(_, t, dest)| {
                assert_eq!(dest, "web-7");
                t
            })
            .collect();
        assert_eq!(media, ["LOAD", "PAUSE", "PLAY", "SEEK", "STOP"]);

        let load = receiver.payloads(Namespace::Media).remove(0);
        assert_eq!(load["media"]["contentId"], "http://media/1.mp4");
        assert_eq!(load["media"]["contentType"], "video/mp4");
        assert_eq!(load["media"]["streamType"], "BUFFERED");
        assert_eq!(load["autoplay"], true);
        conn.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_is_receiver_error() {
        let dialer = FakeDialer::new(ReceiverScript {
            load: LoadBehavior::Fail,
            ..Default::default()
        });
        let conn = open(&dialer).await.unwrap();
        assert!(matches!(
            conn.load("http://media/x.webm").await,
            Err(ConnectionError::Receiver(msg)) if msg.contains("load failed")
        ));
        assert_eq!(conn.media_session_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_heartbeats_signal_loss() {
        let dialer = FakeDialer::new(ReceiverScript {
            pongs: PongPolicy::HandshakeOnly,
            ..Default::default()
        });
        let conn = open(&dialer).await.unwrap();
        let mut watcher = conn.loss_watcher();

        let reason = watcher.lost().await;
        assert!(reason.contains("heartbeat"));
        assert!(conn.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn answered_heartbeats_keep_connection() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        let conn = open(&dialer).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(conn.loss_watcher().reason().is_none());
        assert!(!conn.is_closed());
        conn.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_close_signals_loss() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        let conn = open(&dialer).await.unwrap();
        let mut watcher = conn.loss_watcher();

        dialer.last_receiver().unwrap().close_connection().await;
        assert!(watcher.lost().await.contains("closed the connection"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_sends_goodbyes_and_is_idempotent() {
        let dialer = FakeDialer::new(ReceiverScript::default());
        let conn = open(&dialer).await.unwrap();
        conn.close().await;
        conn.close().await;
        assert!(conn.is_closed());

        let receiver = dialer.last_receiver().unwrap();
        receiver.wait_for_hangup().await;
        let closes: Vec<String> = receiver
            .payload_types()
            .into_iter()
            .filter(|(ns, t, _)| *ns == Namespace::Connection && t == "CLOSE")
            .map(|(_, _, dest)| dest)
            .collect();
        assert_eq!(closes, ["web-7", RECEIVER_ID]);

        assert!(matches!(conn.play().await, Err(ConnectionError::Closed)));
        // Closing does not count as a loss.
        assert!(conn.loss_watcher().reason().is_none());
    }
}
