//! In-memory device registry keyed by device id.
//!
//! The registry is shared by the discovery engine and the session manager;
//! each method takes the lock for its own duration only. Session bindings
//! are tracked apart from the device records, so a bound device that
//! expires and is rediscovered comes back with its session status.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::DiscoveryError;
use crate::types::{Device, DeviceRecord, DeviceStatus};

/// Result of merging a probe record into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
}

#[derive(Debug, Default)]
struct State {
    devices: HashMap<String, Device>,
    /// Session status of every device held by a session, registered or not.
    bindings: HashMap<String, DeviceStatus>,
}

/// Tracks known receiver devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    state: RwLock<State>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a new device or refreshes a known one.
    ///
    /// A refresh updates the network identity and advances `last_seen`
    /// (never backwards). A device held by a session keeps, or on
    /// reinsertion regains, the session's status.
    pub fn upsert(&self, record: DeviceRecord, seen_at: Instant) -> UpsertOutcome {
        let mut state = self.write();
        let bound = state.bindings.get(&record.id).copied();
        if let Some(existing) = state.devices.get_mut(&record.id) {
            existing.name = record.name;
            existing.host = record.host;
            existing.port = record.port;
            existing.device_type = record.device_type;
            existing.addresses = record.addresses;
            existing.last_seen = Some(match existing.last_seen {
                Some(prev) if prev > seen_at => prev,
                _ => seen_at,
            });
            existing.status = bound.unwrap_or(match existing.status {
                DeviceStatus::Lost => DeviceStatus::Available,
                status => status,
            });
            UpsertOutcome::Refreshed
        } else {
            let id = record.id.clone();
            let mut device = Device::from_record(record, seen_at);
            if let Some(status) = bound {
                device.status = status;
            }
            state.devices.insert(id, device);
            UpsertOutcome::Inserted
        }
    }

    /// Removes a device, returning its last snapshot marked as lost.
    ///
    /// A session binding on the id survives the removal.
    pub fn remove(&self, id: &str) -> Option<Device> {
        self.write().devices.remove(id).map(|mut dev| {
            dev.status = DeviceStatus::Lost;
            dev
        })
    }

    /// Returns a snapshot of all devices.
    pub fn list(&self) -> Vec<Device> {
        self.read().devices.values().cloned().collect()
    }

    /// Returns a device by id.
    pub fn get(&self, id: &str) -> Result<Device, DiscoveryError> {
        self.read()
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().devices.is_empty()
    }

    /// Records the session status of a device.
    ///
    /// `connecting` and `connected` bind the id, any other status releases
    /// it. The binding is kept even while the device is not registered.
    /// Returns false if the device is not currently registered.
    pub fn set_status(&self, id: &str, status: DeviceStatus) -> bool {
        let mut state = self.write();
        if status.is_bound() {
            state.bindings.insert(id.to_string(), status);
        } else {
            state.bindings.remove(id);
        }
        match state.devices.get_mut(id) {
            Some(dev) => {
                dev.status = status;
                true
            }
            None => false,
        }
    }

    /// Returns true while a session holds the device.
    pub fn is_bound(&self, id: &str) -> bool {
        self.read().bindings.contains_key(id)
    }

    /// Removes every device not seen within `stale_after` of `now`.
    pub fn expire(&self, stale_after: Duration, now: Instant) -> Vec<Device> {
        let mut state = self.write();
        let stale: Vec<String> = state
            .devices
            .values()
            .filter(|dev| dev.is_stale(stale_after, now))
            .map(|dev| dev.id.clone())
            .collect();

        stale
            .iter()
            .filter_map(|id| state.devices.remove(id))
            .map(|mut dev| {
                dev.status = DeviceStatus::Lost;
                dev
            })
            .collect()
    }

    /// Drops every device not held by a session. Returns the count removed.
    pub fn retain_bound(&self) -> usize {
        let mut state = self.write();
        let State { devices, bindings } = &mut *state;
        let before = devices.len();
        devices.retain(|id, _| bindings.contains_key(id));
        before - devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DeviceRecord {
        DeviceRecord {
            id: id.into(),
            name: format!("Device {id}"),
            device_type: "chromecast".into(),
            host: "192.168.1.10".into(),
            port: 8009,
            addresses: vec![],
        }
    }

    #[test]
    fn upsert_inserts_then_refreshes() {
        let reg = DeviceRegistry::new();
        let t0 = Instant::now();
        assert_eq!(reg.upsert(record("d1"), t0), UpsertOutcome::Inserted);

        let mut updated = record("d1");
        updated.host = "192.168.1.11".into();
        let t1 = t0 + Duration::from_secs(5);
        assert_eq!(reg.upsert(updated, t1), UpsertOutcome::Refreshed);

        let dev = reg.get("d1").unwrap();
        assert_eq!(dev.host, "192.168.1.11");
        assert_eq!(dev.last_seen, Some(t1));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn last_seen_never_moves_backwards() {
        let reg = DeviceRegistry::new();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);
        reg.upsert(record("d1"), later);
        reg.upsert(record("d1"), t0);
        assert_eq!(reg.get("d1").unwrap().last_seen, Some(later));
    }

    #[test]
    fn upsert_preserves_session_status() {
        let reg = DeviceRegistry::new();
        reg.upsert(record("d1"), Instant::now());
        assert!(reg.set_status("d1", DeviceStatus::Connected));
        reg.upsert(record("d1"), Instant::now());
        assert_eq!(reg.get("d1").unwrap().status, DeviceStatus::Connected);
    }

    #[test]
    fn get_missing_is_not_found() {
        let reg = DeviceRegistry::new();
        assert!(matches!(reg.get("nope"), Err(DiscoveryError::NotFound(id)) if id == "nope"));
    }

    #[test]
    fn remove_marks_lost() {
        let reg = DeviceRegistry::new();
        reg.upsert(record("d1"), Instant::now());
        let removed = reg.remove("d1").unwrap();
        assert_eq!(removed.status, DeviceStatus::Lost);
        assert!(reg.remove("d1").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn expire_removes_only_stale() {
        let reg = DeviceRegistry::new();
        let t0 = Instant::now();
        reg.upsert(record("old"), t0);
        reg.upsert(record("fresh"), t0 + Duration::from_secs(25));

        let now = t0 + Duration::from_secs(31);
        let expired = reg.expire(Duration::from_secs(30), now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "old");
        assert!(reg.contains("fresh"));

        // Already removed, so a second pass reports nothing.
        assert!(reg.expire(Duration::from_secs(30), now).is_empty());
    }

    #[test]
    fn retain_bound_keeps_session_devices() {
        let reg = DeviceRegistry::new();
        let now = Instant::now();
        reg.upsert(record("a"), now);
        reg.upsert(record("b"), now);
        reg.upsert(record("c"), now);
        reg.set_status("b", DeviceStatus::Connected);
        reg.set_status("c", DeviceStatus::Connecting);

        assert_eq!(reg.retain_bound(), 1);
        let mut ids: Vec<String> = reg.list().into_iter().map(|d| d.id).collect();
        ids.sort();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn set_status_on_missing_device() {
        let reg = DeviceRegistry::new();
        assert!(!reg.set_status("ghost", DeviceStatus::Connected));
    }

    #[test]
    fn bound_device_regains_status_after_expiry() {
        let reg = DeviceRegistry::new();
        let t0 = Instant::now();
        reg.upsert(record("d1"), t0);
        reg.set_status("d1", DeviceStatus::Connected);

        let expired = reg.expire(Duration::from_secs(30), t0 + Duration::from_secs(31));
        assert_eq!(expired.len(), 1);
        assert!(reg.is_bound("d1"));

        reg.upsert(record("d1"), t0 + Duration::from_secs(40));
        assert_eq!(reg.get("d1").unwrap().status, DeviceStatus::Connected);
        assert_eq!(reg.retain_bound(), 0);
        assert!(reg.contains("d1"));
    }

    #[test]
    fn removed_bound_device_reinserts_bound() {
        let reg = DeviceRegistry::new();
        reg.upsert(record("d1"), Instant::now());
        reg.set_status("d1", DeviceStatus::Connecting);
        assert_eq!(reg.remove("d1").unwrap().status, DeviceStatus::Lost);

        reg.upsert(record("d1"), Instant::now());
        assert_eq!(reg.get("d1").unwrap().status, DeviceStatus::Connecting);
    }

    #[test]
    fn releasing_an_absent_device_unbinds_it() {
        let reg = DeviceRegistry::new();
        reg.upsert(record("d1"), Instant::now());
        reg.set_status("d1", DeviceStatus::Connected);
        reg.remove("d1");

        assert!(!reg.set_status("d1", DeviceStatus::Available));
        assert!(!reg.is_bound("d1"));
        reg.upsert(record("d1"), Instant::now());
        assert_eq!(reg.get("d1").unwrap().status, DeviceStatus::Available);
        assert_eq!(reg.retain_bound(), 1);
    }
}
