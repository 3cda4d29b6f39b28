//! Host collaborator interfaces.
//!
//! The module never reaches into process-wide state: everything it needs from the
//! server supervisor is handed in through these traits at construction time. They
//! are deliberately narrow and synchronous; a host whose implementation does I/O
//! should queue the work and return.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::request::Player;

mod mock;

pub use mock::{MockServer, SentMessage};

/// Looks up online players.
pub trait PlayerDirectory: Send + Sync {
    /// Resolve a username to an online player.
    fn resolve_username(&self, username: &str) -> Option<Player>;
}

/// Delivers chat messages to players.
pub trait MessageSink: Send + Sync {
    /// Fire-and-forget; delivery failures are the sink's concern.
    fn send(&self, player: &Player, message: Message);
}

/// Moves players around the world.
pub trait Teleporter: Send + Sync {
    /// Move `player` to `target`'s location.
    fn teleport(&self, player: &Player, target: &Player);
}

/// Handler invoked when a registered command matches.
pub type CommandHandler = Arc<dyn Fn(&CommandEvent) + Send + Sync>;

/// Handler invoked when a player connects.
pub type ConnectHandler = Arc<dyn Fn(&PlayerConnected) + Send + Sync>;

/// A chat command the host matched against a registered pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub player: Player,
    /// Capture groups of the pattern, in order.
    pub args: Vec<String>,
}

/// A player joined the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConnected {
    pub player: Player,
    pub is_op: bool,
}

/// A command registration.
///
/// Several registrations may share a name (e.g. a usage variant without arguments).
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub pattern: Regex,
    pub description: String,
    /// Host must check operator privilege before invoking the handler.
    pub requires_op: bool,
    pub handler: CommandHandler,
}

impl Command {
    pub fn info(&self) -> CommandInfo {
        CommandInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            requires_op: self.requires_op,
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("requires_op", &self.requires_op)
            .finish_non_exhaustive()
    }
}

/// What a player can learn about a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub requires_op: bool,
}

/// The host's command registry.
pub trait CommandRegistry: Send + Sync {
    fn register_command(&self, command: Command);

    /// Commands `player` may run, in registration order.
    fn accessible_commands(&self, player: &Player) -> Vec<CommandInfo>;
}

/// The host's event bus.
pub trait EventBus: Send + Sync {
    fn on_player_connected(&self, handler: ConnectHandler);
}

/// Manifest of a plugin known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub developer: String,
    pub version: String,
}

/// Plugin management and server facts.
pub trait PluginHost: Send + Sync {
    /// Every plugin the host knows about, loaded or not.
    fn plugins(&self) -> Vec<PluginManifest>;

    fn is_loaded(&self, name: &str) -> bool;

    /// Reload all plugins.
    fn reload(&self) -> Result<()>;

    fn server_version(&self) -> String;

    fn operator_count(&self) -> usize;
}

/// Everything the essentials module needs from its host.
pub trait ServerHost:
    PlayerDirectory + MessageSink + Teleporter + CommandRegistry + EventBus + PluginHost
{
}

impl<T> ServerHost for T where
    T: PlayerDirectory + MessageSink + Teleporter + CommandRegistry + EventBus + PluginHost
{
}
