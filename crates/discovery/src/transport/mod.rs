//! Probe transports that find Cast receivers on the local network.
//!
//! Every transport answers a single probe with the replies it collected
//! within the response window. The engine owns the cadence; transports
//! never keep their own timers.

mod manual;
mod mdns;
mod ssdp;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::warn;

use crate::DiscoveryError;
use crate::types::DeviceRecord;

pub use manual::ManualTransport;
pub use mdns::{MdnsTransport, parse_resolved};
pub use ssdp::{SsdpTransport, parse_ssdp_response};

/// Boxed future returned by [`DiscoveryTransport::probe`].
pub type ProbeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ProbeReply>, DiscoveryError>> + Send + 'a>>;

/// One reply collected during a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeReply {
    /// A device answered with a usable identity.
    Found(DeviceRecord),
    /// A device announced its departure.
    Gone(String),
    /// A response that could not be turned into a device.
    Malformed(String),
}

/// A source of probe replies.
pub trait DiscoveryTransport: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Sends one probe and collects replies for up to `wait`.
    fn probe(&self, wait: Duration) -> ProbeFuture<'_>;
}

/// Runs several transports concurrently and merges their replies.
pub struct CompositeTransport {
    transports: Vec<Arc<dyn DiscoveryTransport>>,
}

impl CompositeTransport {
    pub fn new(transports: Vec<Arc<dyn DiscoveryTransport>>) -> Self {
        Self { transports }
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl DiscoveryTransport for CompositeTransport {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn probe(&self, wait: Duration) -> ProbeFuture<'_> {
        Box::pin(async move {
            if self.transports.is_empty() {
                return Ok(Vec::new());
            }

            let results = join_all(self.transports.iter().map(|t| t.probe(wait))).await;

            let mut replies = Vec::new();
            let mut failures = Vec::new();
            for (transport, result) in self.transports.iter().zip(results) {
                match result {
                    Ok(mut r) => replies.append(&mut r),
                    Err(e) => {
                        warn!(transport = transport.name(), error = %e, "probe failed");
                        failures.push(format!("{}: {e}", transport.name()));
                    }
                }
            }

            if failures.len() == self.transports.len() {
                return Err(DiscoveryError::Network(failures.join("; ")));
            }
            Ok(replies)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<ProbeReply>);

    impl DiscoveryTransport for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn probe(&self, _wait: Duration) -> ProbeFuture<'_> {
            let replies = self.0.clone();
            Box::pin(async move { Ok(replies) })
        }
    }

    struct Broken;

    impl DiscoveryTransport for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn probe(&self, _wait: Duration) -> ProbeFuture<'_> {
            Box::pin(async { Err(DiscoveryError::Network("socket closed".into())) })
        }
    }

    #[tokio::test]
    async fn merges_replies_and_tolerates_one_failure() {
        let composite = CompositeTransport::new(vec![
            Arc::new(Fixed(vec![ProbeReply::Gone("a".into())])),
            Arc::new(Broken),
            Arc::new(Fixed(vec![ProbeReply::Malformed("junk".into())])),
        ]);
        let replies = composite.probe(Duration::from_millis(10)).await.unwrap();
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn all_failures_is_an_error() {
        let composite = CompositeTransport::new(vec![Arc::new(Broken), Arc::new(Broken)]);
        let err = composite.probe(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Network(msg) if msg.contains("broken")));
    }

    #[tokio::test]
    async fn empty_composite_yields_nothing() {
        let composite = CompositeTransport::new(Vec::new());
        assert!(composite.is_empty());
        assert!(composite.probe(Duration::from_millis(10)).await.unwrap().is_empty());
    }
}
