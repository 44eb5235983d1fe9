use dashmap::{DashMap, DashSet};

/// Working state shared by the workers of one scan pass and discarded after.
///
/// Rows created during a scan are not durable until the collector commits,
/// so workers publish the groups they pick here for the others to see.
#[derive(Debug, Default)]
pub struct ScanSession {
    hash_groups: DashMap<String, String>,
    name_groups: DashMap<(i64, String), String>,
    claimed_moves: DashSet<i64>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_group(&self, hash: &str) -> Option<String> {
        self.hash_groups.get(hash).map(|g| g.value().clone())
    }

    /// Publish `candidate` for `hash` unless another worker got there first,
    /// and return whichever group is now registered.
    pub fn publish_hash_group(&self, hash: &str, candidate: String) -> String {
        if let Some(existing) = self.hash_group(hash) {
            return existing;
        }
        self.hash_groups
            .entry(hash.to_string())
            .or_insert(candidate)
            .value()
            .clone()
    }

    pub fn name_group(&self, folder_id: i64, canonical: &str) -> Option<String> {
        self.name_groups
            .get(&(folder_id, canonical.to_string()))
            .map(|g| g.value().clone())
    }

    /// Same contract as [`publish_hash_group`](Self::publish_hash_group),
    /// keyed by folder and canonical name.
    pub fn publish_name_group(&self, folder_id: i64, canonical: String, group_id: &str) -> String {
        self.name_groups
            .entry((folder_id, canonical))
            .or_insert_with(|| group_id.to_string())
            .value()
            .clone()
    }

    /// A stored record may be moved by at most one path per scan.
    pub fn claim_move(&self, asset_id: i64) -> bool {
        self.claimed_moves.insert(asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_hash_group_first_writer_wins() {
        let session = ScanSession::new();
        assert_eq!(session.publish_hash_group("h", "g1".into()), "g1");
        assert_eq!(session.publish_hash_group("h", "g2".into()), "g1");
        assert_eq!(session.hash_group("h").as_deref(), Some("g1"));
    }

    #[test]
    fn test_publish_hash_group_concurrent_converges() {
        let session = Arc::new(ScanSession::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || session.publish_hash_group("same", format!("g{}", i)))
            })
            .collect();
        let groups: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(groups.iter().all(|g| g == &groups[0]));
    }

    #[test]
    fn test_publish_name_group_returns_registered_group() {
        let session = ScanSession::new();
        assert_eq!(session.publish_name_group(1, "crate".into(), "g1"), "g1");
        assert_eq!(session.publish_name_group(1, "crate".into(), "g2"), "g1");
        assert_eq!(session.publish_name_group(2, "crate".into(), "g3"), "g3");
    }

    #[test]
    fn test_publish_name_group_concurrent_converges() {
        let session = Arc::new(ScanSession::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    session.publish_name_group(1, "crate".into(), &format!("g{}", i))
                })
            })
            .collect();
        let groups: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(groups.iter().all(|g| g == &groups[0]));
    }

    #[test]
    fn test_claim_move_once() {
        let session = ScanSession::new();
        assert!(session.claim_move(7));
        assert!(!session.claim_move(7));
    }
}
