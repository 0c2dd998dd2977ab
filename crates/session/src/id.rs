//! Session identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

const PREFIX: &str = "cast_session";

/// Random bytes appended to every id (produces 8 hex characters).
const SUFFIX_BYTES: usize = 4;

/// Issues session ids of the form `cast_session_<device>_<seq>_<hex>`.
///
/// The sequence number makes ids unique within the process; the random
/// suffix keeps them distinct across restarts.
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    seq: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, device_id: &str) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut bytes = [0u8; SUFFIX_BYTES];
        rand::thread_rng().fill(&mut bytes);
        format!("{PREFIX}_{device_id}_{seq}_{}", hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn id_shape() {
        let ids = SessionIdGenerator::new();
        let id = ids.next("d1");
        assert!(id.starts_with("cast_session_d1_1_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn rapid_ids_for_one_device_are_distinct() {
        let ids = SessionIdGenerator::new();
        let all: HashSet<String> = (0..1000).map(|_| ids.next("d1")).collect();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn concurrent_ids_are_distinct() {
        let ids = Arc::new(SessionIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next("tv")).collect::<Vec<_>>())
            })
            .collect();
        let all: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 1000);
    }
}
