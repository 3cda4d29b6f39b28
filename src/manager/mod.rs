//! Storage for live teleport requests.
//!
//! This module defines the `RequestStorage` trait, the single owner of every live
//! request. Implementations serialize all reads and writes behind one lock so the
//! one-outgoing / one-incoming rule can't be raced past.

use chrono::{DateTime, Utc};

use crate::error::ConflictError;
use crate::request::{Pending, Player, RequestId, TeleportRequest};

mod memory;

pub use memory::InMemoryRequestStore;

/// Storage trait for live teleport requests.
///
/// Only `TeleportRequest<Pending>` values are stored. Each operation is atomic with
/// respect to the store's invariants, and none of them may block on I/O.
pub trait RequestStorage: Send + Sync {
    /// Create a new pending request.
    ///
    /// Fails with [`ConflictError::CreatorHasOutgoingRequest`] if `creator` already
    /// created a live request, else with [`ConflictError::RecipientHasIncomingRequest`]
    /// if `recipient` already received one. The check and the insert happen under the
    /// same lock.
    fn create(
        &self,
        creator: Player,
        recipient: Player,
    ) -> Result<TeleportRequest<Pending>, ConflictError>;

    /// First live request created by `player`.
    fn find_by_creator(&self, player: &Player) -> Option<TeleportRequest<Pending>>;

    /// First live request addressed to `player`.
    fn find_by_recipient(&self, player: &Player) -> Option<TeleportRequest<Pending>>;

    /// Remove a request from the store and hand it back.
    ///
    /// Returns `None` if the request was already removed (resolved or swept), which
    /// makes the removal happen exactly once no matter who races for it.
    fn resolve(&self, id: RequestId) -> Option<TeleportRequest<Pending>>;

    /// Remove and return every request that has timed out at `now`.
    fn sweep_at(&self, now: DateTime<Utc>) -> Vec<TeleportRequest<Pending>>;

    /// Remove and return every request that has timed out.
    fn sweep(&self) -> Vec<TeleportRequest<Pending>> {
        self.sweep_at(Utc::now())
    }

    /// Number of requests held, including timed-out ones not yet swept.
    fn len(&self) -> usize;

    /// Number of requests still live at `now`.
    fn live_len_at(&self, now: DateTime<Utc>) -> usize;

    fn live_len(&self) -> usize {
        self.live_len_at(Utc::now())
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
