#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use castlink_discovery::{DeviceRecord, DiscoveryTransport, ProbeFuture, ProbeReply};
use castlink_protocol::CastEvent;
use castlink_protocol::events::BufferSink;

/// Transport that answers every probe with the same configurable devices.
#[derive(Default)]
pub struct StaticTransport {
    records: Mutex<Vec<DeviceRecord>>,
}

impl StaticTransport {
    pub fn new(records: Vec<DeviceRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
        })
    }

    pub fn set(&self, records: Vec<DeviceRecord>) {
        *self.records.lock().unwrap() = records;
    }
}

impl DiscoveryTransport for StaticTransport {
    fn name(&self) -> &'static str {
        "static"
    }

    fn probe(&self, _wait: Duration) -> ProbeFuture<'_> {
        let replies = self
            .records
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .map(ProbeReply::Found)
            .collect();
        Box::pin(async move { Ok(replies) })
    }
}

pub fn record(id: &str, name: &str, host: &str) -> DeviceRecord {
    DeviceRecord {
        id: id.into(),
        name: name.into(),
        device_type: "chromecast".into(),
        host: host.into(),
        port: 8009,
        addresses: vec![],
    }
}

pub fn names(sink: &BufferSink) -> Vec<&'static str> {
    sink.snapshot().iter().map(CastEvent::name).collect()
}

/// Polls `cond` until it holds, failing the test after a minute of
/// (possibly paused) time.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}
