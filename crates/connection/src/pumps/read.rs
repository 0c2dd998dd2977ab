//! Read pump: decodes frames and dispatches them by namespace.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use castlink_protocol::constants::SENDER_ID;
use castlink_protocol::messages::{
    ConnectionMessage, HeartbeatMessage, MediaResponse, ReceiverResponse,
};
use castlink_protocol::wire::read_frame;
use castlink_protocol::{CastMessage, Namespace};

use crate::connection::{LossSignal, Outbound, PendingMap, Reply};
use crate::pumps::heartbeat::HeartbeatState;

/// Shared state the read pump dispatches into.
pub(crate) struct ReadContext {
    pub pending: PendingMap,
    pub write_tx: mpsc::Sender<Outbound>,
    pub heartbeat: Arc<HeartbeatState>,
    pub loss: LossSignal,
}

/// Reads frames until cancelled or the receiver goes away.
///
/// End of stream, a read error or a `CLOSE` from the receiver raise the
/// loss signal and cancel the sibling pumps. Pending requests are dropped
/// so their callers see the connection as closed.
pub(crate) async fn read_pump<R>(mut reader: R, ctx: ReadContext, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = read_frame(&mut reader) => {
                // A local close shuts the stream down; that is not a loss.
                if cancel.is_cancelled() {
                    break;
                }
                match frame {
                    Ok(Some(msg)) => {
                        if let Some(reason) = dispatch(&msg, &ctx).await {
                            debug!(%reason, "receiver ended the connection");
                            ctx.loss.raise(reason);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("receiver stream ended");
                        ctx.loss.raise("receiver closed the stream".into());
                        break;
                    }
                    Err(e) => {
                        warn!("receiver read error: {e}");
                        ctx.loss.raise(format!("read failed: {e}"));
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    ctx.pending.lock().await.clear();
}

/// Handles one frame. Returns a reason when the connection must end.
async fn dispatch(msg: &CastMessage, ctx: &ReadContext) -> Option<String> {
    trace!(
        namespace = %msg.namespace,
        source = %msg.source_id,
        payload = %msg.payload_utf8,
        "received frame"
    );

    let Ok(namespace) = msg.parsed_namespace() else {
        trace!(namespace = %msg.namespace, "ignoring frame on unhandled namespace");
        return None;
    };

    match namespace {
        Namespace::Connection => match parse::<ConnectionMessage>(msg) {
            Some(ConnectionMessage::Close) => {
                return Some(format!("{} closed the connection", msg.source_id));
            }
            Some(_) | None => {}
        },
        Namespace::Heartbeat => match parse::<HeartbeatMessage>(msg) {
            Some(HeartbeatMessage::Ping) => {
                match CastMessage::json(
                    SENDER_ID,
                    msg.source_id.as_str(),
                    Namespace::Heartbeat,
                    &HeartbeatMessage::Pong,
                ) {
                    Ok(pong) => {
                        let _ = ctx.write_tx.send(Outbound::Frame(pong)).await;
                    }
                    Err(e) => warn!("failed to encode PONG: {e}"),
                }
            }
            Some(HeartbeatMessage::Pong) => ctx.heartbeat.pong_received(),
            Some(HeartbeatMessage::Unknown) | None => {}
        },
        Namespace::Receiver => {
            if let Some(resp) = parse::<ReceiverResponse>(msg) {
                route(resp.request_id(), Reply::Receiver(resp), ctx).await;
            }
        }
        Namespace::Media => {
            if let Some(resp) = parse::<MediaResponse>(msg) {
                route(resp.request_id(), Reply::Media(resp), ctx).await;
            }
        }
    }
    None
}

fn parse<T: DeserializeOwned>(msg: &CastMessage) -> Option<T> {
    match serde_json::from_str(&msg.payload_utf8) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(namespace = %msg.namespace, "failed to parse payload: {e}");
            None
        }
    }
}

/// Hands a reply to the request waiting on its id. Broadcasts (id 0) and
/// replies nobody waits for are dropped.
async fn route(request_id: i64, reply: Reply, ctx: &ReadContext) {
    if request_id != 0 {
        if let Some(tx) = ctx.pending.lock().await.remove(&request_id) {
            let _ = tx.send(reply);
            return;
        }
    }
    trace!(request_id, "unsolicited status update");
}
