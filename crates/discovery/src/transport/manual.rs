use std::time::Duration;

use super::{DiscoveryTransport, ProbeFuture, ProbeReply};
use crate::types::DeviceRecord;

/// Replays a fixed list of configured receivers on every probe.
///
/// Useful on networks where multicast is filtered.
#[derive(Debug, Clone, Default)]
pub struct ManualTransport {
    records: Vec<DeviceRecord>,
}

impl ManualTransport {
    pub fn new(records: Vec<DeviceRecord>) -> Self {
        Self { records }
    }
}

impl DiscoveryTransport for ManualTransport {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn probe(&self, _wait: Duration) -> ProbeFuture<'_> {
        let replies = self
            .records
            .iter()
            .map(|record| match record.validate() {
                Ok(()) => ProbeReply::Found(record.clone()),
                Err(e) => ProbeReply::Malformed(e.to_string()),
            })
            .collect();
        Box::pin(async move { Ok(replies) })
    }
}
