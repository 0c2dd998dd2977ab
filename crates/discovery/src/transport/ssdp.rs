use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use castlink_protocol::constants::{DEFAULT_CAST_PORT, DIAL_SEARCH_TARGET};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{DiscoveryTransport, ProbeFuture, ProbeReply};
use crate::DiscoveryError;
use crate::types::DeviceRecord;

const SSDP_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

/// Device type reported for receivers found through DIAL.
pub const DIAL_DEVICE_TYPE: &str = "dial";

/// Sends an SSDP `M-SEARCH` for DIAL receivers and collects unicast replies.
#[derive(Debug, Default)]
pub struct SsdpTransport;

impl SsdpTransport {
    pub fn new() -> Self {
        Self
    }
}

fn search_request(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {SSDP_MULTICAST}:{SSDP_PORT}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {DIAL_SEARCH_TARGET}\r\n\r\n"
    )
}

impl DiscoveryTransport for SsdpTransport {
    fn name(&self) -> &'static str {
        "ssdp"
    }

    fn probe(&self, wait: Duration) -> ProbeFuture<'_> {
        Box::pin(async move {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
                .await
                .map_err(|e| DiscoveryError::Network(format!("failed to bind SSDP socket: {e}")))?;

            let mx = wait.as_secs().clamp(1, 5);
            let target = SocketAddr::from((SSDP_MULTICAST, SSDP_PORT));
            socket
                .send_to(search_request(mx).as_bytes(), target)
                .await
                .map_err(|e| DiscoveryError::Network(format!("failed to send M-SEARCH: {e}")))?;

            let mut replies = Vec::new();
            let mut seen = HashSet::new();
            let mut buf = [0u8; 2048];
            let deadline = Instant::now() + wait;

            loop {
                let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
                let (len, from) = match received {
                    Ok(Ok(pair)) => pair,
                    Ok(Err(e)) => {
                        debug!(error = %e, "SSDP receive failed");
                        break;
                    }
                    Err(_) => break,
                };

                let text = String::from_utf8_lossy(&buf[..len]);
                trace!(%from, "SSDP reply");
                let reply = parse_ssdp_response(&text);
                // One entry per device per probe; devices often answer twice.
                if let ProbeReply::Found(record) = &reply {
                    if !seen.insert(record.id.clone()) {
                        continue;
                    }
                }
                replies.push(reply);
            }

            Ok(replies)
        })
    }
}

/// Parses one SSDP search response.
///
/// The device id comes from the `uuid:` part of `USN` and the host from the
/// `LOCATION` URL. The name prefers a friendly-name header, then `SERVER`,
/// then the host. The Cast channel itself always listens on port 8009.
pub fn parse_ssdp_response(text: &str) -> ProbeReply {
    let mut lines = text.lines();
    let status = lines.next().unwrap_or_default().trim();
    if !status.starts_with("HTTP/1.1 200") {
        return ProbeReply::Malformed(format!("unexpected status line: {status}"));
    }

    let mut location = None;
    let mut usn = None;
    let mut friendly_name = None;
    let mut server = None;
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "location" => location = Some(value.to_string()),
            "usn" => usn = Some(value.to_string()),
            "friendly-name" | "x-friendly-name" => friendly_name = Some(value.to_string()),
            "server" => server = Some(value.to_string()),
            _ => {}
        }
    }

    let (Some(location), Some(usn)) = (location, usn) else {
        return ProbeReply::Malformed("missing LOCATION or USN header".into());
    };

    let Some(id) = device_id_from_usn(&usn) else {
        return ProbeReply::Malformed(format!("USN without uuid: {usn}"));
    };
    let Some(host) = host_from_location(&location) else {
        return ProbeReply::Malformed(format!("unparseable LOCATION: {location}"));
    };

    let addresses = host.parse::<IpAddr>().map(|ip| vec![ip]).unwrap_or_default();
    ProbeReply::Found(DeviceRecord {
        id,
        name: friendly_name.or(server).unwrap_or_else(|| host.clone()),
        device_type: DIAL_DEVICE_TYPE.to_string(),
        host,
        port: DEFAULT_CAST_PORT,
        addresses,
    })
}

fn device_id_from_usn(usn: &str) -> Option<String> {
    let rest = usn.strip_prefix("uuid:")?;
    let uuid = rest.split("::").next()?.trim();
    if uuid.is_empty() {
        return None;
    }
    Some(uuid.replace('-', "").to_lowercase())
}

fn host_from_location(location: &str) -> Option<String> {
    let rest = location.split_once("://").map(|(_, r)| r)?;
    let authority = rest.split('/').next()?;
    let host = if let Some(stripped) = authority.strip_prefix('[') {
        stripped.split(']').next()?
    } else {
        authority.split(':').next()?
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
