//! Teleport request lifecycle.
//!
//! The controller turns player commands into store operations and tells every
//! affected player what happened. Store operations take the store lock briefly;
//! messages and teleports are issued only after the lock is released.

use std::sync::Arc;

use metrics::{counter, gauge};

use crate::error::{EssentialsError, Result};
use crate::host::{MessageSink, PlayerDirectory, Teleporter};
use crate::manager::RequestStorage;
use crate::message;
use crate::request::{Accepted, Denied, Expired, Pending, Player, TeleportRequest};

/// Orchestrates create/accept/deny and the expiry sweep.
pub struct RequestLifecycleController<S, H>
where
    S: RequestStorage,
    H: PlayerDirectory + MessageSink + Teleporter,
{
    storage: Arc<S>,
    host: Arc<H>,
}

impl<S, H> RequestLifecycleController<S, H>
where
    S: RequestStorage,
    H: PlayerDirectory + MessageSink + Teleporter,
{
    pub fn new(storage: Arc<S>, host: Arc<H>) -> Self {
        Self { storage, host }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// `creator` asks to be teleported to the player named `recipient`.
    #[tracing::instrument(skip(self, creator), fields(creator = %creator))]
    pub fn request_teleport(
        &self,
        creator: &Player,
        recipient: &str,
    ) -> Result<TeleportRequest<Pending>> {
        let result = self
            .host
            .resolve_username(recipient)
            .ok_or_else(|| EssentialsError::PlayerNotFound(recipient.to_string()))
            .and_then(|recipient| {
                self.storage
                    .create(creator.clone(), recipient)
                    .map_err(EssentialsError::from)
            });

        let request = match result {
            Ok(request) => request,
            Err(e) => return Err(self.reject(creator, e)),
        };

        counter!("essentials_tpa_created_total").increment(1);
        self.record_live();
        tracing::info!(
            request_id = %request.data.id,
            recipient = %request.data.recipient,
            "Teleport request created"
        );

        let data = &request.data;
        self.host.send(
            &data.recipient,
            message::request_received(data.creator.username()),
        );
        self.host.send(
            &data.creator,
            message::request_sent(data.recipient.username()),
        );

        Ok(request)
    }

    /// `recipient` accepts their incoming request; the creator is teleported to them.
    #[tracing::instrument(skip(self, recipient), fields(recipient = %recipient))]
    pub fn accept(&self, recipient: &Player) -> Result<TeleportRequest<Accepted>> {
        let accepted = match self
            .incoming(recipient)
            .and_then(|request| request.accept(self.storage.as_ref()))
        {
            Ok(accepted) => accepted,
            Err(e) => return Err(self.reject(recipient, e)),
        };
        self.record_live();

        let data = &accepted.data;
        tracing::info!(
            request_id = %data.id,
            creator = %data.creator,
            "Teleport request accepted"
        );

        self.host.send(
            &data.creator,
            message::teleporting_to(data.recipient.username()),
        );
        self.host.send(
            &data.recipient,
            message::being_teleported_to_by(data.creator.username()),
        );
        self.host.teleport(&data.creator, &data.recipient);

        Ok(accepted)
    }

    /// `recipient` declines their incoming request.
    #[tracing::instrument(skip(self, recipient), fields(recipient = %recipient))]
    pub fn deny(&self, recipient: &Player) -> Result<TeleportRequest<Denied>> {
        let denied = match self
            .incoming(recipient)
            .and_then(|request| request.deny(self.storage.as_ref()))
        {
            Ok(denied) => denied,
            Err(e) => return Err(self.reject(recipient, e)),
        };
        self.record_live();

        let data = &denied.data;
        tracing::info!(
            request_id = %data.id,
            creator = %data.creator,
            "Teleport request denied"
        );

        self.host.send(
            &data.creator,
            message::request_declined(data.recipient.username()),
        );
        self.host.send(&data.recipient, message::request_denied());

        Ok(denied)
    }

    /// Remove timed-out requests and tell both parties.
    ///
    /// Only requests nobody responded to ever reach this point: accepted and denied
    /// requests left the store when they were resolved. Each notice is independent;
    /// nothing a sink does for one request affects the others.
    pub fn run_sweep_cycle(&self) -> Vec<TeleportRequest<Expired>> {
        let expired: Vec<_> = self
            .storage
            .sweep()
            .into_iter()
            .map(TeleportRequest::<Pending>::expire)
            .collect();

        if expired.is_empty() {
            return expired;
        }
        self.record_live();
        tracing::debug!(count = expired.len(), "Swept expired teleport requests");

        for request in &expired {
            let data = &request.data;
            tracing::info!(
                request_id = %data.id,
                creator = %data.creator,
                recipient = %data.recipient,
                "Teleport request expired"
            );
            self.host.send(
                &data.creator,
                message::outgoing_expired(data.recipient.username()),
            );
            self.host.send(
                &data.recipient,
                message::incoming_expired(data.creator.username()),
            );
        }

        expired
    }

    fn incoming(&self, recipient: &Player) -> Result<TeleportRequest<Pending>> {
        self.storage
            .find_by_recipient(recipient)
            .ok_or(EssentialsError::NoPendingRequest)
    }

    /// Send the rejection for `error` to `player` and hand the error back.
    fn reject(&self, player: &Player, error: EssentialsError) -> EssentialsError {
        counter!("essentials_tpa_rejected_total", "reason" => error.reason()).increment(1);
        tracing::debug!(player = %player, reason = error.reason(), "Teleport command rejected");

        if let Some(rejection) = error.rejection_message() {
            self.host.send(player, rejection);
        }
        error
    }

    fn record_live(&self) {
        gauge!("essentials_tpa_live").set(self.storage.live_len() as f64);
    }
}
