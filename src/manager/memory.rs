//! In-memory request store.
//!
//! Requests are transient: nothing survives a restart.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::RequestStorage;
use crate::error::ConflictError;
use crate::request::{Pending, Player, RequestId, TeleportRequest};

/// Default time a request stays live without a response.
pub const DEFAULT_REQUEST_TTL: chrono::Duration = chrono::Duration::seconds(60);

/// Request store backed by a mutex-guarded vector.
///
/// The vector is small (at most one entry per online player), so linear scans are
/// fine. Lookups skip requests that have timed out but not yet been swept; those are
/// no longer live and must not block new requests or be accepted.
pub struct InMemoryRequestStore {
    requests: Mutex<Vec<TeleportRequest<Pending>>>,
    ttl: chrono::Duration,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_REQUEST_TTL)
    }

    pub fn with_ttl(ttl: chrono::Duration) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Create a request with an explicit creation time.
    pub fn create_at(
        &self,
        creator: Player,
        recipient: Player,
        now: DateTime<Utc>,
    ) -> Result<TeleportRequest<Pending>, ConflictError> {
        let mut requests = self.requests.lock();

        let live = |r: &&TeleportRequest<Pending>| r.is_live_at(now, self.ttl);
        if requests.iter().filter(live).any(|r| r.data.creator == creator) {
            return Err(ConflictError::CreatorHasOutgoingRequest);
        }
        if requests
            .iter()
            .filter(live)
            .any(|r| r.data.recipient == recipient)
        {
            return Err(ConflictError::RecipientHasIncomingRequest);
        }

        let request = TeleportRequest::new(creator, recipient, now);
        requests.push(request.clone());
        Ok(request)
    }

    fn find_live<F>(&self, now: DateTime<Utc>, matches: F) -> Option<TeleportRequest<Pending>>
    where
        F: Fn(&TeleportRequest<Pending>) -> bool,
    {
        self.requests
            .lock()
            .iter()
            .find(|r| r.is_live_at(now, self.ttl) && matches(r))
            .cloned()
    }
}

impl Default for InMemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStorage for InMemoryRequestStore {
    fn create(
        &self,
        creator: Player,
        recipient: Player,
    ) -> Result<TeleportRequest<Pending>, ConflictError> {
        self.create_at(creator, recipient, Utc::now())
    }

    fn find_by_creator(&self, player: &Player) -> Option<TeleportRequest<Pending>> {
        self.find_live(Utc::now(), |r| &r.data.creator == player)
    }

    fn find_by_recipient(&self, player: &Player) -> Option<TeleportRequest<Pending>> {
        self.find_live(Utc::now(), |r| &r.data.recipient == player)
    }

    fn resolve(&self, id: RequestId) -> Option<TeleportRequest<Pending>> {
        let mut requests = self.requests.lock();
        let index = requests.iter().position(|r| r.data.id == id)?;
        Some(requests.swap_remove(index))
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> Vec<TeleportRequest<Pending>> {
        let mut requests = self.requests.lock();
        let (expired, live): (Vec<_>, Vec<_>) = requests
            .drain(..)
            .partition(|r| r.is_expired_at(now, self.ttl));
        *requests = live;
        expired
    }

    fn len(&self) -> usize {
        self.requests.lock().len()
    }

    fn live_len_at(&self, now: DateTime<Utc>) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.is_live_at(now, self.ttl))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn player(name: &str) -> Player {
        Player::new(name)
    }

    #[test]
    fn test_second_outgoing_request_is_rejected() {
        let store = InMemoryRequestStore::new();
        store.create(player("a"), player("b")).unwrap();

        let err = store.create(player("a"), player("c")).unwrap_err();
        assert_eq!(err, ConflictError::CreatorHasOutgoingRequest);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_second_incoming_request_is_rejected() {
        let store = InMemoryRequestStore::new();
        store.create(player("a"), player("b")).unwrap();

        let err = store.create(player("c"), player("b")).unwrap_err();
        assert_eq!(err, ConflictError::RecipientHasIncomingRequest);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_creator_conflict_is_reported_before_recipient_conflict() {
        let store = InMemoryRequestStore::new();
        store.create(player("a"), player("b")).unwrap();

        let err = store.create(player("a"), player("b")).unwrap_err();
        assert_eq!(err, ConflictError::CreatorHasOutgoingRequest);
    }

    #[test]
    fn test_players_may_hold_one_request_in_each_direction() {
        let store = InMemoryRequestStore::new();
        store.create(player("a"), player("b")).unwrap();
        store.create(player("b"), player("a")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.find_by_creator(&player("b")).unwrap().data.recipient,
            player("a")
        );
        assert_eq!(
            store.find_by_recipient(&player("b")).unwrap().data.creator,
            player("a")
        );
    }

    #[test]
    fn test_resolve_removes_exactly_once() {
        let store = InMemoryRequestStore::new();
        let request = store.create(player("a"), player("b")).unwrap();

        let resolved = store.resolve(request.data.id).unwrap();
        assert_eq!(resolved.data.id, request.data.id);
        assert!(store.resolve(request.data.id).is_none());
        assert!(store.find_by_creator(&player("a")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_returns_only_timed_out_requests() {
        let store = InMemoryRequestStore::new();
        let now = Utc::now();
        let old = store
            .create_at(player("a"), player("b"), now - chrono::Duration::seconds(61))
            .unwrap();
        let fresh = store.create_at(player("c"), player("d"), now).unwrap();

        let swept = store.sweep_at(now);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].data.id, old.data.id);

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.find_by_creator(&player("c")).unwrap().data.id,
            fresh.data.id
        );
        assert!(store.sweep_at(now).is_empty());
    }

    #[test]
    fn test_resolved_request_is_not_swept() {
        let store = InMemoryRequestStore::new();
        let now = Utc::now();
        let request = store
            .create_at(player("a"), player("b"), now - chrono::Duration::seconds(61))
            .unwrap();
        store.resolve(request.data.id).unwrap();

        assert!(store.sweep_at(now).is_empty());
    }

    #[test]
    fn test_timed_out_request_is_not_live() {
        let store = InMemoryRequestStore::new();
        let stale_at = Utc::now() - chrono::Duration::seconds(90);
        store.create_at(player("a"), player("b"), stale_at).unwrap();

        assert!(store.find_by_creator(&player("a")).is_none());
        assert!(store.find_by_recipient(&player("b")).is_none());

        // Neither party is blocked by a request nobody can act on any more.
        store.create(player("a"), player("b")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_len(), 1);
        assert_eq!(store.sweep().len(), 1);
        assert_eq!(store.live_len(), store.len());
    }

    #[test]
    fn test_live_len_excludes_unswept_timed_out_requests() {
        let store = InMemoryRequestStore::new();
        let now = Utc::now();
        store
            .create_at(player("a"), player("b"), now - chrono::Duration::seconds(61))
            .unwrap();
        store.create_at(player("c"), player("d"), now).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.live_len_at(now), 1);
        assert_eq!(store.live_len_at(now + chrono::Duration::seconds(60)), 0);
    }

    #[test]
    fn test_live_requests_never_share_a_party() {
        let store = InMemoryRequestStore::new();
        let names = ["a", "b", "c", "d", "e", "f"];

        // Every ordered pair, in a scrambled but deterministic order.
        let mut pairs = Vec::new();
        for (i, c) in names.iter().enumerate() {
            for (j, r) in names.iter().enumerate() {
                if i != j {
                    pairs.push(((i * 7 + j * 3) % 11, *c, *r));
                }
            }
        }
        pairs.sort();

        for (step, (_, creator, recipient)) in pairs.into_iter().enumerate() {
            let _ = store.create(player(creator), player(recipient));
            if step % 5 == 4
                && let Some(request) = store.find_by_creator(&player(creator))
            {
                store.resolve(request.data.id);
            }

            // Nothing is old enough to sweep yet.
            assert!(store.sweep_at(Utc::now() - chrono::Duration::days(1)).is_empty());

            let requests = store.requests.lock();
            let creators: HashSet<_> = requests.iter().map(|r| &r.data.creator).collect();
            let recipients: HashSet<_> = requests.iter().map(|r| &r.data.recipient).collect();
            assert_eq!(creators.len(), requests.len());
            assert_eq!(recipients.len(), requests.len());
        }
    }

    #[test]
    fn test_concurrent_creates_for_one_recipient_admit_exactly_one() {
        let store = Arc::new(InMemoryRequestStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .create(player(&format!("creator-{}", i)), player("target"))
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.len(), 1);
    }
}
