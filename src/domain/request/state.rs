//! Core types for teleport requests.
//!
//! Each request progresses through distinct states, enforced at compile time.
//! Only `TeleportRequest<Pending>` values ever live in a request store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A player as seen by this module.
///
/// Players are referenced by identity only: the module reads the username and hands
/// the handle back to host collaborators, it never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Player {
    username: String,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}

/// Marker trait for valid request states.
pub trait RequestState: Send + Sync {}

/// A teleport request from `creator` to `recipient`.
///
/// Uses the typestate pattern: the generic parameter `T` is the current state, and
/// transitions consume the request and return it in its next state.
///
/// ```text
/// TeleportRequest<Pending> ──accept()──> TeleportRequest<Accepted>
///                          ──deny()────> TeleportRequest<Denied>
///                          ──expire()──> TeleportRequest<Expired>
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TeleportRequest<T: RequestState> {
    /// The current state of the request.
    pub state: T,
    /// The immutable request data.
    pub data: RequestData,
}

/// Data fixed when the request is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestData {
    pub id: RequestId,
    /// Player asking to be teleported
    pub creator: Player,
    /// Player being asked to receive the teleport
    pub recipient: Player,
    pub created_at: DateTime<Utc>,
}

impl RequestData {
    /// Age of the request at `now`. Never negative.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }
}

// ============================================================================
// Request States
// ============================================================================

/// Request is waiting for the recipient to respond.
#[derive(Debug, Clone, Serialize)]
pub struct Pending {}

impl RequestState for Pending {}

/// Recipient accepted; the creator has been teleported.
#[derive(Debug, Clone, Serialize)]
pub struct Accepted {
    pub accepted_at: DateTime<Utc>,
}

impl RequestState for Accepted {}

/// Recipient declined.
#[derive(Debug, Clone, Serialize)]
pub struct Denied {
    pub denied_at: DateTime<Utc>,
}

impl RequestState for Denied {}

/// Nobody responded before the request timed out.
#[derive(Debug, Clone, Serialize)]
pub struct Expired {
    pub expired_at: DateTime<Utc>,
}

impl RequestState for Expired {}

impl TeleportRequest<Pending> {
    /// Build a new pending request created at `created_at`.
    pub fn new(creator: Player, recipient: Player, created_at: DateTime<Utc>) -> Self {
        Self {
            state: Pending {},
            data: RequestData {
                id: RequestId::from(Uuid::new_v4()),
                creator,
                recipient,
                created_at,
            },
        }
    }

    /// Whether this request has timed out at `now` under the given ttl.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.data.age_at(now) >= ttl
    }

    /// Whether this request is live at `now`: not yet timed out.
    pub fn is_live_at(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        !self.is_expired_at(now, ttl)
    }
}

/// Unique identifier for a teleport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
