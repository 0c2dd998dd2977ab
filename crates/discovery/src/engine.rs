//! Periodic discovery driver.
//!
//! The engine owns the probe cadence. Each cycle asks the transport for
//! replies, reconciles them against the registry and expires stale devices.
//! A generation counter guards every registry mutation so that replies
//! arriving after `stop()` never repopulate the registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use castlink_protocol::{CastEvent, EventSink};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::DiscoveryError;
use crate::registry::{DeviceRegistry, UpsertOutcome};
use crate::transport::{DiscoveryTransport, ProbeReply};
use crate::types::{DEFAULT_PROBE_INTERVAL, DEFAULT_RESPONSE_WAIT, DEFAULT_STALE_TIMEOUT, Device};

/// Extra time granted to a transport beyond its response window.
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Timing knobs for the discovery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub probe_interval: Duration,
    pub response_wait: Duration,
    pub stale_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            response_wait: DEFAULT_RESPONSE_WAIT,
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.probe_interval.is_zero() {
            return Err(DiscoveryError::Config("probe interval must be positive".into()));
        }
        if self.response_wait.is_zero() {
            return Err(DiscoveryError::Config("response wait must be positive".into()));
        }
        if self.stale_timeout.is_zero() {
            return Err(DiscoveryError::Config("stale timeout must be positive".into()));
        }
        Ok(())
    }
}

/// What a single probe cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Replies were reconciled against the registry.
    Completed {
        discovered: usize,
        lost: usize,
        malformed: usize,
    },
    /// Another cycle was still running.
    Skipped,
    /// Discovery was stopped while the probe was in flight.
    Discarded,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    transport: Arc<dyn DiscoveryTransport>,
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn EventSink>,
    config: DiscoveryConfig,
    generation: Mutex<u64>,
    busy: AtomicBool,
}

/// Clears the busy flag when a cycle ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs periodic probes and keeps the device registry current.
pub struct DiscoveryEngine {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl DiscoveryEngine {
    pub fn new(
        transport: Arc<dyn DiscoveryTransport>,
        registry: Arc<DeviceRegistry>,
        sink: Arc<dyn EventSink>,
        config: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                registry,
                sink,
                config,
                generation: Mutex::new(0),
                busy: AtomicBool::new(false),
            }),
            running: Mutex::new(None),
        })
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts periodic probing. Must be called from within a Tokio runtime.
    ///
    /// Unbound devices left over from a previous run are dropped first.
    pub fn start(&self) -> Result<(), DiscoveryError> {
        let mut running = self.running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(DiscoveryError::AlreadyActive);
        }

        let generation = {
            let mut current = self.inner.generation();
            *current += 1;
            self.inner.registry.retain_bound();
            *current
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.inner.clone(), cancel.clone(), generation));
        *running = Some(Running { cancel, handle });

        info!(
            transport = self.inner.transport.name(),
            interval = ?self.inner.config.probe_interval,
            "discovery started"
        );
        Ok(())
    }

    /// Stops probing and drops every device not held by a session.
    ///
    /// Safe to call when discovery is not running.
    pub fn stop(&self) {
        let was_running = match self.running().take() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => false,
        };

        let removed = {
            let mut current = self.inner.generation();
            *current += 1;
            self.inner.registry.retain_bound()
        };

        if was_running {
            info!(removed, "discovery stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Snapshot of the registry.
    pub fn devices(&self) -> Vec<Device> {
        self.inner.registry.list()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// Runs one probe cycle now, outside the periodic schedule.
    pub async fn probe_once(&self) -> CycleOutcome {
        let generation = *self.inner.generation();
        self.inner.run_cycle(generation, None).await
    }
}

impl Drop for DiscoveryEngine {
    fn drop(&mut self) {
        if let Some(running) = self.running().take() {
            running.cancel.cancel();
        }
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken, generation: u64) {
    let mut ticker = tokio::time::interval(inner.config.probe_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let outcome = inner.run_cycle(generation, Some(&cancel)).await;
                debug!(?outcome, "probe cycle finished");
                if outcome == CycleOutcome::Discarded {
                    break;
                }
            }
        }
    }
}

impl Inner {
    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the registry only if discovery hasn't been restarted
    /// or stopped since `generation` was taken.
    fn with_generation<T>(&self, generation: u64, f: impl FnOnce(&DeviceRegistry) -> T) -> Option<T> {
        let current = self.generation();
        if *current != generation {
            return None;
        }
        Some(f(&self.registry))
    }

    async fn run_cycle(&self, generation: u64, cancel: Option<&CancellationToken>) -> CycleOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("previous probe still running, skipping cycle");
            return CycleOutcome::Skipped;
        };

        let wait = self.config.response_wait;
        let probe = tokio::time::timeout(wait + PROBE_GRACE, self.transport.probe(wait));
        let result = match cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => return CycleOutcome::Discarded,
                r = probe => r,
            },
            None => probe.await,
        };

        let replies = match result {
            Ok(Ok(replies)) => replies,
            Ok(Err(e)) => {
                warn!(transport = self.transport.name(), error = %e, "probe failed");
                Vec::new()
            }
            Err(_) => {
                warn!(transport = self.transport.name(), "probe exceeded response window");
                Vec::new()
            }
        };

        let now = Instant::now();
        let mut events = Vec::new();
        let (mut discovered, mut lost, mut malformed) = (0, 0, 0);

        let applied = self.with_generation(generation, |registry| {
            for reply in replies {
                match reply {
                    ProbeReply::Found(record) => {
                        let id = record.id.clone();
                        match registry.upsert(record, now) {
                            UpsertOutcome::Inserted => {
                                if let Ok(device) = registry.get(&id) {
                                    debug!(device = %id, host = %device.host, "device discovered");
                                    events.push(device.discovered_event());
                                    discovered += 1;
                                }
                            }
                            UpsertOutcome::Refreshed => trace!(device = %id, "device refreshed"),
                        }
                    }
                    ProbeReply::Gone(id) => {
                        if registry.remove(&id).is_some() {
                            debug!(device = %id, "device announced departure");
                            events.push(CastEvent::device_lost(id));
                            lost += 1;
                        }
                    }
                    ProbeReply::Malformed(reason) => {
                        warn!(transport = self.transport.name(), %reason, "skipping malformed probe response");
                        malformed += 1;
                    }
                }
            }

            for device in registry.expire(self.config.stale_timeout, now) {
                debug!(device = %device.id, "device went stale");
                events.push(CastEvent::device_lost(device.id));
                lost += 1;
            }
        });

        if applied.is_none() {
            debug!("discovery stopped during probe, discarding replies");
            return CycleOutcome::Discarded;
        }

        for event in events {
            self.sink.emit(event);
        }

        CycleOutcome::Completed {
            discovered,
            lost,
            malformed,
        }
    }
}
