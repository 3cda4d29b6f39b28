//! Error types for the essentials module.

use thiserror::Error;

use crate::message::{self, Message};

/// Result type alias using the essentials error type.
pub type Result<T> = std::result::Result<T, EssentialsError>;

/// Rejection raised by the request store when a new request would break the
/// one-outgoing / one-incoming rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictError {
    /// The creator already has a live outgoing request
    #[error("creator already has an outgoing teleport request")]
    CreatorHasOutgoingRequest,

    /// The recipient already has a live incoming request
    #[error("recipient already has an incoming teleport request")]
    RecipientHasIncomingRequest,
}

impl ConflictError {
    /// Short label used for metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictError::CreatorHasOutgoingRequest => "creator_has_outgoing",
            ConflictError::RecipientHasIncomingRequest => "recipient_has_incoming",
        }
    }
}

/// Main error type for the essentials module.
#[derive(Error, Debug)]
pub enum EssentialsError {
    /// No online player has the given username
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    /// A new request would conflict with a live one
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Accept/deny issued with nothing to resolve
    #[error("No pending teleport request")]
    NoPendingRequest,

    /// The host failed to reload its plugins
    #[error("Plugin reload failed: {0}")]
    ReloadFailed(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EssentialsError {
    /// The chat message sent back to the acting player for this error.
    ///
    /// Only player-facing rejections have one; internal failures return `None`.
    pub fn rejection_message(&self) -> Option<Message> {
        match self {
            EssentialsError::PlayerNotFound(_) => Some(message::player_not_found()),
            EssentialsError::Conflict(ConflictError::CreatorHasOutgoingRequest) => {
                Some(message::outgoing_request_exists())
            }
            EssentialsError::Conflict(ConflictError::RecipientHasIncomingRequest) => {
                Some(message::incoming_request_exists())
            }
            EssentialsError::NoPendingRequest => Some(message::no_pending_request()),
            EssentialsError::ReloadFailed(reason) => Some(message::reload_failed(reason)),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            EssentialsError::PlayerNotFound(_) => "player_not_found",
            EssentialsError::Conflict(conflict) => conflict.as_str(),
            EssentialsError::NoPendingRequest => "no_pending_request",
            EssentialsError::ReloadFailed(_) => "reload_failed",
            EssentialsError::HttpClient(_) => "http",
            EssentialsError::Serialization(_) => "serialization",
            EssentialsError::Other(_) => "other",
        }
    }
}
