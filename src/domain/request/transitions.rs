//! State transitions for teleport requests using the typestate pattern.
//!
//! ```text
//! TeleportRequest<Pending> ──accept()──> TeleportRequest<Accepted>
//!       │
//!       ├──deny()────> TeleportRequest<Denied>
//!       │
//!       └──expire()──> TeleportRequest<Expired>
//! ```
//!
//! # Exactly one terminal transition
//!
//! `accept` and `deny` remove the request from storage as part of the transition. If
//! the removal finds nothing (the sweep or another command got there first) the
//! transition fails with [`EssentialsError::NoPendingRequest`] and nothing else
//! happens. `expire` is only called on requests the sweep already removed, so it
//! cannot fail.
//!
//! Transitions never notify anyone; the controller does that once the store lock
//! has been released.

use metrics::counter;

use crate::error::{EssentialsError, Result};
use crate::manager::RequestStorage;

use super::state::{Accepted, Denied, Expired, Pending, TeleportRequest};

impl TeleportRequest<Pending> {
    pub fn accept<S: RequestStorage + ?Sized>(
        self,
        storage: &S,
    ) -> Result<TeleportRequest<Accepted>> {
        let removed = storage
            .resolve(self.data.id)
            .ok_or(EssentialsError::NoPendingRequest)?;

        counter!("essentials_tpa_resolved_total", "outcome" => "accepted").increment(1);
        tracing::debug!(request_id = %removed.data.id, "Teleport request accepted");

        Ok(TeleportRequest {
            data: removed.data,
            state: Accepted {
                accepted_at: chrono::Utc::now(),
            },
        })
    }

    pub fn deny<S: RequestStorage + ?Sized>(self, storage: &S) -> Result<TeleportRequest<Denied>> {
        let removed = storage
            .resolve(self.data.id)
            .ok_or(EssentialsError::NoPendingRequest)?;

        counter!("essentials_tpa_resolved_total", "outcome" => "denied").increment(1);
        tracing::debug!(request_id = %removed.data.id, "Teleport request denied");

        Ok(TeleportRequest {
            data: removed.data,
            state: Denied {
                denied_at: chrono::Utc::now(),
            },
        })
    }

    /// Mark a request the sweep removed as expired.
    pub fn expire(self) -> TeleportRequest<Expired> {
        counter!("essentials_tpa_resolved_total", "outcome" => "expired").increment(1);

        TeleportRequest {
            data: self.data,
            state: Expired {
                expired_at: chrono::Utc::now(),
            },
        }
    }
}
