//! Write pump: serialises outbound frames onto the stream.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use castlink_protocol::wire::write_frame;

use crate::connection::{LossSignal, Outbound};

/// Writes queued frames until cancelled or the queue closes, then shuts
/// the stream down.
pub(crate) async fn write_pump<W>(
    mut writer: W,
    mut write_rx: mpsc::Receiver<Outbound>,
    loss: LossSignal,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(Outbound::Frame(frame)) => {
                        trace!(
                            namespace = %frame.namespace,
                            dest = %frame.destination_id,
                            payload = %frame.payload_utf8,
                            "sending frame"
                        );
                        if let Err(e) = write_frame(&mut writer, &frame).await {
                            warn!("receiver write error: {e}");
                            loss.raise(format!("write failed: {e}"));
                            cancel.cancel();
                            break;
                        }
                    }
                    Some(Outbound::Flush(done)) => {
                        let _ = done.send(());
                    }
                    None => break,
                }
            }
        }
    }

    let _ = writer.shutdown().await;
}
