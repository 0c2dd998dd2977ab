//! In-process fake receiver for tests.
//!
//! [`FakeDialer`] hands out one end of a `tokio::io::duplex` pipe and runs a
//! scripted receiver on the other end. The receiver answers heartbeats,
//! launches and media requests the way a Default Media Receiver does, and
//! records every frame it gets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, watch};

use castlink_protocol::constants::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION_CASTV2_1_0, RECEIVER_ID, SENDER_ID,
};
use castlink_protocol::wire::{read_frame, write_frame};
use castlink_protocol::{CastMessage, Namespace};

use crate::ConnectionError;
use crate::dialer::{BoxedStream, DialFuture, Dialer};

/// Which PINGs the receiver answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongPolicy {
    Always,
    /// Only the handshake PING.
    HandshakeOnly,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchBehavior {
    Launch,
    Fail,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBehavior {
    Play,
    Fail,
    Ignore,
}

/// How a fake receiver behaves.
#[derive(Debug, Clone)]
pub struct ReceiverScript {
    pub pongs: PongPolicy,
    pub launch: LaunchBehavior,
    pub load: LoadBehavior,
    pub transport_id: String,
    pub media_session_id: i64,
}

impl Default for ReceiverScript {
    fn default() -> Self {
        Self {
            pongs: PongPolicy::Always,
            launch: LaunchBehavior::Launch,
            load: LoadBehavior::Play,
            transport_id: "web-7".into(),
            media_session_id: 1,
        }
    }
}

enum Command {
    SendClose,
}

/// Handle to a running fake receiver.
#[derive(Clone)]
pub struct ReceiverHandle {
    log: Arc<Mutex<Vec<CastMessage>>>,
    commands: mpsc::Sender<Command>,
    done: watch::Receiver<bool>,
}

impl ReceiverHandle {
    /// Every frame received so far.
    pub fn messages(&self) -> Vec<CastMessage> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `(namespace, type, destination)` for every frame received so far.
    pub fn payload_types(&self) -> Vec<(Namespace, String, String)> {
        self.messages()
            .into_iter()
            .filter_map(|m| {
                let ns = m.parsed_namespace().ok()?;
                let payload: Value = serde_json::from_str(&m.payload_utf8).ok()?;
                let kind = payload["type"].as_str()?.to_string();
                Some((ns, kind, m.destination_id))
            })
            .collect()
    }

    /// Parsed payloads received on `namespace`.
    pub fn payloads(&self, namespace: Namespace) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter(|m| m.namespace == namespace.as_str())
            .filter_map(|m| serde_json::from_str(&m.payload_utf8).ok())
            .collect()
    }

    /// Makes the receiver send `CLOSE` on the connection namespace.
    pub async fn close_connection(&self) {
        let _ = self.commands.send(Command::SendClose).await;
    }

    /// Waits until the sender side has shut the stream.
    pub async fn wait_for_hangup(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|d| *d).await;
    }
}

/// Runs a fake receiver on `stream` until the peer hangs up.
pub fn spawn_receiver(stream: DuplexStream, script: ReceiverScript) -> ReceiverHandle {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (commands_tx, mut commands_rx) = mpsc::channel(8);
    let (done_tx, done_rx) = watch::channel(false);
    let (mut reader, mut writer) = tokio::io::split(stream);

    // Frames are read on their own task so the main loop can select safely.
    let (frames_tx, mut frames_rx) = mpsc::channel::<CastMessage>(32);
    tokio::spawn(async move {
        while let Ok(Some(msg)) = read_frame(&mut reader).await {
            if frames_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let task_log = log.clone();
    tokio::spawn(async move {
        let mut pings = 0u32;
        loop {
            tokio::select! {
                frame = frames_rx.recv() => {
                    let Some(msg) = frame else { break };
                    task_log.lock().unwrap_or_else(PoisonError::into_inner).push(msg.clone());
                    for reply in respond(&msg, &script, &mut pings) {
                        if write_frame(&mut writer, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(cmd) = commands_rx.recv() => match cmd {
                    Command::SendClose => {
                        let close = reply(RECEIVER_ID, SENDER_ID, Namespace::Connection, json!({"type": "CLOSE"}));
                        let _ = write_frame(&mut writer, &close).await;
                    }
                },
            }
        }
        let _ = done_tx.send(true);
    });

    ReceiverHandle {
        log,
        commands: commands_tx,
        done: done_rx,
    }
}

fn reply(source: &str, dest: &str, ns: Namespace, payload: Value) -> CastMessage {
    CastMessage {
        protocol_version: PROTOCOL_VERSION_CASTV2_1_0,
        source_id: source.to_string(),
        destination_id: dest.to_string(),
        namespace: ns.as_str().to_string(),
        payload_utf8: payload.to_string(),
    }
}

fn respond(msg: &CastMessage, script: &ReceiverScript, pings: &mut u32) -> Vec<CastMessage> {
    let Ok(ns) = msg.parsed_namespace() else {
        return Vec::new();
    };
    let Ok(payload) = serde_json::from_str::<Value>(&msg.payload_utf8) else {
        return Vec::new();
    };
    let kind = payload["type"].as_str().unwrap_or_default();
    let request_id = payload["requestId"].as_i64().unwrap_or_default();
    let from = msg.destination_id.as_str();
    let to = msg.source_id.as_str();

    match (ns, kind) {
        (Namespace::Heartbeat, "PING") => {
            *pings += 1;
            let answer = match script.pongs {
                PongPolicy::Always => true,
                PongPolicy::HandshakeOnly => *pings == 1,
                PongPolicy::Never => false,
            };
            if answer {
                vec![reply(from, to, ns, json!({"type": "PONG"}))]
            } else {
                Vec::new()
            }
        }
        (Namespace::Receiver, "LAUNCH") => match script.launch {
            LaunchBehavior::Launch => vec![reply(
                from,
                to,
                ns,
                json!({
                    "type": "RECEIVER_STATUS",
                    "requestId": request_id,
                    "status": {"applications": [{
                        "appId": payload["appId"],
                        "sessionId": "session-1",
                        "transportId": script.transport_id,
                        "displayName": "Default Media Receiver",
                    }]},
                }),
            )],
            LaunchBehavior::Fail => vec![reply(
                from,
                to,
                ns,
                json!({"type": "LAUNCH_ERROR", "requestId": request_id, "reason": "NOT_FOUND"}),
            )],
            LaunchBehavior::Ignore => Vec::new(),
        },
        (Namespace::Media, "LOAD") => match script.load {
            LoadBehavior::Play => vec![media_status(from, to, request_id, script, "PLAYING")],
            LoadBehavior::Fail => vec![reply(
                from,
                to,
                ns,
                json!({"type": "LOAD_FAILED", "requestId": request_id}),
            )],
            LoadBehavior::Ignore => Vec::new(),
        },
        (Namespace::Media, "PLAY" | "SEEK") => {
            vec![media_status(from, to, request_id, script, "PLAYING")]
        }
        (Namespace::Media, "PAUSE") => vec![media_status(from, to, request_id, script, "PAUSED")],
        (Namespace::Media, "STOP") => vec![media_status(from, to, request_id, script, "IDLE")],
        _ => Vec::new(),
    }
}

fn media_status(from: &str, to: &str, request_id: i64, script: &ReceiverScript, state: &str) -> CastMessage {
    reply(
        from,
        to,
        Namespace::Media,
        json!({
            "type": "MEDIA_STATUS",
            "requestId": request_id,
            "status": [{"mediaSessionId": script.media_session_id, "playerState": state}],
        }),
    )
}

/// Dialer that connects to fake receivers.
pub struct FakeDialer {
    script: Mutex<ReceiverScript>,
    refuse: AtomicBool,
    hang: AtomicBool,
    receivers: Mutex<Vec<ReceiverHandle>>,
}

impl FakeDialer {
    pub fn new(script: ReceiverScript) -> Self {
        Self {
            script: Mutex::new(script),
            refuse: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            receivers: Mutex::new(Vec::new()),
        }
    }

    /// Script used for receivers spawned by later dials.
    pub fn set_script(&self, script: ReceiverScript) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = script;
    }

    /// Makes later dials fail as refused.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Makes later dials never complete.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of successful dials.
    pub fn dial_count(&self) -> usize {
        self.receivers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn receivers(&self) -> Vec<ReceiverHandle> {
        self.receivers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_receiver(&self) -> Option<ReceiverHandle> {
        self.receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Dialer for FakeDialer {
    fn dial<'a>(&'a self, host: &'a str, port: u16) -> DialFuture<'a> {
        Box::pin(async move {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ConnectionError::Refused(format!("{host}:{port}")));
            }
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let (client, server) = tokio::io::duplex(MAX_MESSAGE_SIZE);
            let script = self.script.lock().unwrap_or_else(PoisonError::into_inner).clone();
            let handle = spawn_receiver(server, script);
            self.receivers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
            Ok(Box::new(client) as BoxedStream)
        })
    }
}
