//! In-memory host for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{
    Command, CommandEvent, CommandInfo, CommandRegistry, ConnectHandler, EventBus, MessageSink,
    PlayerConnected, PlayerDirectory, PluginHost, PluginManifest, Teleporter,
};
use crate::error::{EssentialsError, Result};
use crate::message::Message;
use crate::request::Player;

/// Mock server host.
///
/// Records every message and teleport, keeps registered commands and connect
/// handlers, and can play the host's part by matching chat text against the
/// registered patterns.
///
/// # Example
/// ```ignore
/// let host = MockServer::new();
/// let alice = host.add_player("alice");
/// host.dispatch(&alice, "!commands");
/// assert!(!host.messages_for(&alice).is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockServer {
    online: Arc<Mutex<HashSet<String>>>,
    ops: Arc<Mutex<HashSet<String>>>,
    messages: Arc<Mutex<Vec<SentMessage>>>,
    teleports: Arc<Mutex<Vec<(Player, Player)>>>,
    commands: Arc<Mutex<Vec<Command>>>,
    connect_handlers: Arc<Mutex<Vec<ConnectHandler>>>,
    plugins: Arc<Mutex<Vec<(PluginManifest, bool)>>>,
    reload_errors: Arc<Mutex<Vec<String>>>,
    reloads: Arc<AtomicUsize>,
    server_version: Arc<Mutex<String>>,
    muted: Arc<Mutex<HashMap<String, usize>>>,
}

/// Record of a message delivered by the mock host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub player: Player,
    pub message: Message,
}

impl MockServer {
    pub fn new() -> Self {
        let server = Self::default();
        *server.server_version.lock() = "1.0.0".to_string();
        server
    }

    /// Bring a player online.
    pub fn add_player(&self, username: &str) -> Player {
        self.online.lock().insert(username.to_string());
        Player::new(username)
    }

    /// Bring an operator online.
    pub fn add_op(&self, username: &str) -> Player {
        self.ops.lock().insert(username.to_string());
        self.add_player(username)
    }

    pub fn remove_player(&self, player: &Player) {
        self.online.lock().remove(player.username());
    }

    pub fn is_op(&self, player: &Player) -> bool {
        self.ops.lock().contains(player.username())
    }

    pub fn add_plugin(&self, manifest: PluginManifest, loaded: bool) {
        self.plugins.lock().push((manifest, loaded));
    }

    pub fn set_server_version(&self, version: &str) {
        *self.server_version.lock() = version.to_string();
    }

    /// Make the next reload fail with `reason`.
    pub fn fail_next_reload(&self, reason: &str) {
        self.reload_errors.lock().push(reason.to_string());
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Silently drop the next `count` messages addressed to `player`.
    pub fn drop_messages_to(&self, player: &Player, count: usize) {
        self.muted
            .lock()
            .insert(player.username().to_string(), count);
    }

    /// Get all messages delivered so far.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().clone()
    }

    /// Plain text of every message delivered to `player`, in order.
    pub fn messages_for(&self, player: &Player) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| &m.player == player)
            .map(|m| m.message.plain_text())
            .collect()
    }

    pub fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    /// Teleports performed so far as `(moved, target)` pairs.
    pub fn teleports(&self) -> Vec<(Player, Player)> {
        self.teleports.lock().clone()
    }

    /// Names of registered commands, in registration order.
    pub fn registered_commands(&self) -> Vec<String> {
        self.commands.lock().iter().map(|c| c.name.clone()).collect()
    }

    /// Match `text` the way a host would and run the first matching handler.
    ///
    /// Returns false if nothing matched or the player lacks the privilege.
    pub fn dispatch(&self, player: &Player, text: &str) -> bool {
        // Clone out so handlers can call back into the registry.
        let matched = self.commands.lock().iter().find_map(|command| {
            command.pattern.captures(text).map(|caps| {
                let args = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect::<Vec<_>>();
                (command.clone(), args)
            })
        });

        let Some((command, args)) = matched else {
            return false;
        };
        if command.requires_op && !self.is_op(player) {
            return false;
        }

        (command.handler)(&CommandEvent {
            player: player.clone(),
            args,
        });
        true
    }

    /// Fire the player-connected event.
    pub fn connect(&self, player: &Player) {
        let event = PlayerConnected {
            player: player.clone(),
            is_op: self.is_op(player),
        };
        let handlers = self.connect_handlers.lock().clone();
        for handler in handlers {
            handler(&event);
        }
    }
}

impl PlayerDirectory for MockServer {
    fn resolve_username(&self, username: &str) -> Option<Player> {
        self.online
            .lock()
            .contains(username)
            .then(|| Player::new(username))
    }
}

impl MessageSink for MockServer {
    fn send(&self, player: &Player, message: Message) {
        {
            let mut muted = self.muted.lock();
            if let Some(remaining) = muted.get_mut(player.username())
                && *remaining > 0
            {
                *remaining -= 1;
                return;
            }
        }

        self.messages.lock().push(SentMessage {
            player: player.clone(),
            message,
        });
    }
}

impl Teleporter for MockServer {
    fn teleport(&self, player: &Player, target: &Player) {
        self.teleports.lock().push((player.clone(), target.clone()));
    }
}

impl CommandRegistry for MockServer {
    fn register_command(&self, command: Command) {
        self.commands.lock().push(command);
    }

    fn accessible_commands(&self, player: &Player) -> Vec<CommandInfo> {
        let is_op = self.is_op(player);
        self.commands
            .lock()
            .iter()
            .filter(|c| is_op || !c.requires_op)
            .map(Command::info)
            .collect()
    }
}

impl EventBus for MockServer {
    fn on_player_connected(&self, handler: ConnectHandler) {
        self.connect_handlers.lock().push(handler);
    }
}

impl PluginHost for MockServer {
    fn plugins(&self) -> Vec<PluginManifest> {
        self.plugins.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    fn is_loaded(&self, name: &str) -> bool {
        self.plugins
            .lock()
            .iter()
            .any(|(m, loaded)| m.name == name && *loaded)
    }

    fn reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        match self.reload_errors.lock().pop() {
            Some(reason) => Err(EssentialsError::ReloadFailed(reason)),
            None => Ok(()),
        }
    }

    fn server_version(&self) -> String {
        self.server_version.lock().clone()
    }

    fn operator_count(&self) -> usize {
        self.ops.lock().len()
    }
}
