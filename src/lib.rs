//! Chat command module for game server supervisors.
//!
//! This crate provides the chat-triggered commands a server supervisor hosts (teleport
//! requests, command and plugin listings, plugin reload, server info) plus an update
//! notice for operators. The stateful part is the teleport request lifecycle: a store
//! that allows at most one outgoing and one incoming live request per player, and a
//! background sweep that expires requests nobody answered.
//!
//! Everything the module needs from the host (player lookup, chat delivery, teleports,
//! command registration, events) is injected through the traits in [`host`].

pub mod controller;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod host;
pub mod http;
pub mod manager;
pub mod message;
pub mod plugin;
pub mod request;

// Re-export commonly used types
pub use controller::RequestLifecycleController;
pub use daemon::{DaemonConfig, SweepDaemon};
pub use error::{ConflictError, EssentialsError, Result};
pub use host::{MockServer, ServerHost};
pub use http::{MockUpdateChecker, ReqwestUpdateChecker, UpdateChecker};
pub use manager::{InMemoryRequestStore, RequestStorage};
pub use message::{Colour, Message};
pub use plugin::{Essentials, EssentialsCommand, EssentialsConfig, UpdateCheckConfig};
pub use request::*;
