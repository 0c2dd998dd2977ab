use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use castlink_protocol::constants::CAST_SERVICE_NAME;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{DiscoveryTransport, ProbeFuture, ProbeReply};
use crate::DiscoveryError;
use crate::types::{DEFAULT_DEVICE_TYPE, DeviceRecord};

/// Browses `_googlecast._tcp` over mDNS/DNS-SD.
///
/// A single daemon is created on first use and reused by every probe.
/// Each probe opens a browse, drains events until the response window
/// closes, then stops the browse.
pub struct MdnsTransport {
    daemon: Mutex<Option<ServiceDaemon>>,
    // fullname -> device id, so removals can be mapped back.
    names: Mutex<HashMap<String, String>>,
}

impl MdnsTransport {
    pub fn new() -> Self {
        Self {
            daemon: Mutex::new(None),
            names: Mutex::new(HashMap::new()),
        }
    }

    fn service_type() -> String {
        format!("{CAST_SERVICE_NAME}.local.")
    }

    fn daemon(&self) -> Result<ServiceDaemon, DiscoveryError> {
        let mut slot = self.daemon.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(daemon) = slot.as_ref() {
            return Ok(daemon.clone());
        }
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Mdns(format!("failed to create mDNS daemon: {e}")))?;
        *slot = Some(daemon.clone());
        Ok(daemon)
    }

    fn handle_event(&self, event: ServiceEvent) -> Option<ProbeReply> {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                let reply = parse_resolved(&info);
                if let ProbeReply::Found(record) = &reply {
                    self.names
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(info.get_fullname().to_string(), record.id.clone());
                }
                Some(reply)
            }
            ServiceEvent::ServiceRemoved(_, fullname) => {
                let id = self
                    .names
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&fullname)
                    .unwrap_or(fullname);
                Some(ProbeReply::Gone(id))
            }
            other => {
                trace!(?other, "ignoring mDNS event");
                None
            }
        }
    }
}

impl Default for MdnsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MdnsTransport {
    fn drop(&mut self) {
        let slot = self.daemon.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(daemon) = slot.take() {
            let _ = daemon.shutdown();
        }
    }
}

impl DiscoveryTransport for MdnsTransport {
    fn name(&self) -> &'static str {
        "mdns"
    }

    fn probe(&self, wait: Duration) -> ProbeFuture<'_> {
        Box::pin(async move {
            let daemon = self.daemon()?;
            let service_type = Self::service_type();
            let receiver = daemon
                .browse(&service_type)
                .map_err(|e| DiscoveryError::Mdns(format!("failed to browse mDNS: {e}")))?;

            let mut replies = Vec::new();
            let deadline = Instant::now() + wait;

            while Instant::now() < deadline {
                // recv is blocking, so poll it off the runtime in short slices.
                let result = tokio::time::timeout(
                    deadline.saturating_duration_since(Instant::now()),
                    tokio::task::spawn_blocking({
                        let receiver = receiver.clone();
                        move || receiver.recv_timeout(Duration::from_millis(100))
                    }),
                )
                .await;

                match result {
                    Ok(Ok(Ok(event))) => {
                        if let Some(reply) = self.handle_event(event) {
                            replies.push(reply);
                        }
                    }
                    Ok(Ok(Err(_))) => continue,
                    Ok(Err(e)) => {
                        debug!(error = %e, "mDNS receive task failed");
                        break;
                    }
                    Err(_) => break,
                }
            }

            if let Err(e) = daemon.stop_browse(&service_type) {
                debug!(error = %e, "failed to stop mDNS browse");
            }
            Ok(replies)
        })
    }
}

/// Turns a resolved `_googlecast._tcp` instance into a probe reply.
///
/// TXT keys used: `id` (device id), `fn` (friendly name), `md` (model).
/// Missing keys fall back to the instance name; a resolved service without
/// a port is malformed.
pub fn parse_resolved(info: &ServiceInfo) -> ProbeReply {
    let fullname = info.get_fullname();
    let port = info.get_port();
    if port == 0 {
        return ProbeReply::Malformed(format!("{fullname}: no port"));
    }

    let txt = |key: &str| {
        info.get_property_val_str(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let instance = fullname
        .strip_suffix(&format!(".{CAST_SERVICE_NAME}.local."))
        .unwrap_or(fullname)
        .to_string();

    let id = txt("id").unwrap_or_else(|| fullname.to_string());
    let name = txt("fn").unwrap_or(instance);
    let device_type = txt("md")
        .map(|m| m.to_lowercase())
        .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.to_string());

    let addresses = usable_addresses(info.get_addresses().iter().copied());
    let host = match addresses.first() {
        Some(ip) => ip.to_string(),
        None => {
            let hostname = info.get_hostname().trim_end_matches('.');
            if hostname.is_empty() {
                return ProbeReply::Malformed(format!("{fullname}: no address"));
            }
            hostname.to_string()
        }
    };

    ProbeReply::Found(DeviceRecord {
        id,
        name,
        device_type,
        host,
        port,
        addresses,
    })
}

/// Keeps IPv4 addresses that are neither loopback nor link-local, sorted.
fn usable_addresses(addrs: impl Iterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = addrs
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_link_local() => Some(IpAddr::V4(v4)),
            _ => None,
        })
        .collect();
    ips.sort();
    ips
}
