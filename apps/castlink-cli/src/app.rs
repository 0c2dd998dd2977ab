//! Command runners wiring the cast service to the terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::time::Instant;

use castlink_connection::TlsDialer;
use castlink_protocol::CastEvent;
use castlink_session::CastService;

use crate::Command;
use crate::config::Config;

const EVENT_BUFFER: usize = 256;

/// How often `cast` checks whether the target device has appeared.
const DEVICE_POLL: Duration = Duration::from_millis(200);

pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let service = CastService::new(
        config.transport()?,
        Arc::new(TlsDialer::new(config.insecure_tls)?),
        Arc::new(events_tx),
        config.discovery_config(),
        config.connection_config(),
    )?;

    let result = match command {
        Command::Discover { seconds } => {
            discover(&service, events_rx, Duration::from_secs(seconds)).await
        }
        Command::Cast {
            device_id,
            media_url,
            wait_secs,
        } => {
            cast(
                &service,
                events_rx,
                &device_id,
                &media_url,
                Duration::from_secs(wait_secs),
            )
            .await
        }
    };

    service.shutdown().await;
    result
}

fn print_event(event: &CastEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to encode event"),
    }
}

fn drain(events: &mut mpsc::Receiver<CastEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

async fn discover(
    service: &CastService,
    mut events: mpsc::Receiver<CastEvent>,
    duration: Duration,
) -> anyhow::Result<()> {
    service.start_discovery()?;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(event) = events.recv() => print_event(&event),
        }
    }
    drain(&mut events);

    let devices = service.get_devices();
    service.stop_discovery();
    println!("{}", serde_json::to_string_pretty(&devices)?);
    tracing::info!(count = devices.len(), "discovery finished");
    Ok(())
}

async fn cast(
    service: &CastService,
    mut events: mpsc::Receiver<CastEvent>,
    device_id: &str,
    media_url: &str,
    wait: Duration,
) -> anyhow::Result<()> {
    service.start_discovery()?;

    let deadline = Instant::now() + wait;
    while !service.get_devices().iter().any(|d| d.id == device_id) {
        anyhow::ensure!(
            Instant::now() < deadline,
            "device {device_id} not discovered within {}s",
            wait.as_secs()
        );
        tokio::select! {
            _ = tokio::time::sleep(DEVICE_POLL) => {}
            Some(event) = events.recv() => print_event(&event),
        }
    }

    let session = service
        .cast_media(device_id, media_url)
        .await
        .with_context(|| format!("casting to {device_id}"));
    drain(&mut events);
    let session = session?;
    tracing::info!(session = %session.session_id, "casting, press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            Some(event) = events.recv() => {
                let ended = matches!(&event, CastEvent::SessionEnded(e) if e.session_id == session.session_id);
                print_event(&event);
                if ended {
                    return Ok(());
                }
            }
        }
    }

    service.stop_casting(&session.session_id).await;
    drain(&mut events);
    Ok(())
}
