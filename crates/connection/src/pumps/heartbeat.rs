//! Heartbeat pump: periodic PING with a missed-reply budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use castlink_protocol::constants::{RECEIVER_ID, SENDER_ID};
use castlink_protocol::messages::HeartbeatMessage;
use castlink_protocol::{CastMessage, Namespace};

use crate::connection::{LossSignal, Outbound};

/// Pings sent since the last PONG, plus a wake-up for handshake waiters.
#[derive(Debug, Default)]
pub(crate) struct HeartbeatState {
    unanswered: AtomicU32,
    pong: Notify,
}

impl HeartbeatState {
    pub(crate) fn ping_sent(&self) {
        self.unanswered.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn pong_received(&self) {
        self.unanswered.store(0, Ordering::Release);
        self.pong.notify_one();
    }

    pub(crate) fn unanswered(&self) -> u32 {
        self.unanswered.load(Ordering::Acquire)
    }

    /// Completes at the next PONG, or immediately if one arrived since the
    /// last call.
    pub(crate) async fn pong(&self) {
        self.pong.notified().await;
    }
}

/// Sends a PING every `interval`. Once `max_missed` pings go unanswered the
/// connection is reported lost and every pump is cancelled.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<Outbound>,
    state: Arc<HeartbeatState>,
    loss: LossSignal,
    interval: Duration,
    max_missed: u32,
    cancel: CancellationToken,
) {
    let ping = match CastMessage::json(
        SENDER_ID,
        RECEIVER_ID,
        Namespace::Heartbeat,
        &HeartbeatMessage::Ping,
    ) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("failed to encode heartbeat: {e}");
            return;
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let missed = state.unanswered();
                if missed >= max_missed {
                    warn!(missed, "receiver stopped answering heartbeats");
                    loss.raise(format!("missed {missed} consecutive heartbeats"));
                    cancel.cancel();
                    break;
                }
                state.ping_sent();
                if write_tx.send(Outbound::Frame(ping.clone())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn three_missed_pongs_raise_loss() {
        let (tx, mut rx) = mpsc::channel(16);
        let state = Arc::new(HeartbeatState::default());
        let loss = LossSignal::new();
        let mut watcher = loss.watcher();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(heartbeat_pump(
            tx,
            state.clone(),
            loss,
            Duration::from_secs(5),
            3,
            cancel.clone(),
        ));

        let reason = watcher.lost().await;
        assert!(reason.contains("3"));
        handle.await.unwrap();
        assert!(cancel.is_cancelled());

        let mut pings = 0;
        while let Ok(Outbound::Frame(_)) = rx.try_recv() {
            pings += 1;
        }
        assert_eq!(pings, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_resets_the_budget() {
        let (tx, mut rx) = mpsc::channel(16);
        let state = Arc::new(HeartbeatState::default());
        let loss = LossSignal::new();
        let watcher = loss.watcher();
        let cancel = CancellationToken::new();

        tokio::spawn(heartbeat_pump(
            tx,
            state.clone(),
            loss,
            Duration::from_secs(5),
            3,
            cancel.clone(),
        ));

        // Answer every ping for a minute.
        let responder = {
            let state = state.clone();
            tokio::spawn(async move {
                while let Some(Outbound::Frame(_)) = rx.recv().await {
                    state.pong_received();
                }
            })
        };

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert!(watcher.reason().is_none());
        assert_eq!(state.unanswered(), 0);

        cancel.cancel();
        responder.abort();
    }

    #[tokio::test]
    async fn pong_wakes_waiter_even_if_early() {
        let state = HeartbeatState::default();
        state.ping_sent();
        state.pong_received();
        tokio::time::timeout(Duration::from_secs(1), state.pong())
            .await
            .expect("stored permit");
    }
}
