//! The essentials module as the host sees it.
//!
//! [`Essentials`] registers the chat commands and the connect handler with the host,
//! and owns the sweep daemon's lifetime. The teleport commands are thin wrappers
//! around [`RequestLifecycleController`]; the others only talk to the host.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controller::RequestLifecycleController;
use crate::daemon::{DaemonConfig, SweepDaemon};
use crate::error::Result;
use crate::host::{Command, CommandEvent, CommandHandler, PlayerConnected, ServerHost};
use crate::http::{ReqwestUpdateChecker, UpdateChecker, check_for_update};
use crate::manager::{InMemoryRequestStore, RequestStorage};
use crate::message::{self, Colour, Message};

/// Where to look for newer releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckConfig {
    /// URL of a JSON manifest of the form `{"version": "x.y.z"}`
    pub manifest_url: String,

    /// Timeout for the manifest request in milliseconds
    #[serde(default = "default_update_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_update_timeout_ms() -> u64 {
    5000
}

/// Configuration for the essentials module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EssentialsConfig {
    /// Sweep cadence and request lifetime
    pub daemon: DaemonConfig,

    /// Version compared against the update manifest
    pub version: String,

    /// Update check settings; `None` disables the check unless a checker is passed
    /// to [`Essentials::new`] directly
    pub update_check: Option<UpdateCheckConfig>,
}

impl Default for EssentialsConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            update_check: None,
        }
    }
}

impl EssentialsConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Chat commands this module registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EssentialsCommand {
    Commands,
    Plugins,
    Reload,
    Tpa,
    TpAccept,
    TpDeny,
    Info,
}

impl EssentialsCommand {
    pub const ALL: &'static [EssentialsCommand] = &[
        EssentialsCommand::Commands,
        EssentialsCommand::Plugins,
        EssentialsCommand::Reload,
        EssentialsCommand::Tpa,
        EssentialsCommand::TpAccept,
        EssentialsCommand::TpDeny,
        EssentialsCommand::Info,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EssentialsCommand::Commands => "!commands",
            EssentialsCommand::Plugins => "!plugins",
            EssentialsCommand::Reload => "!reload",
            EssentialsCommand::Tpa => "!tpa",
            EssentialsCommand::TpAccept => "!tpaccept",
            EssentialsCommand::TpDeny => "!tpdeny",
            EssentialsCommand::Info => "!info",
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            EssentialsCommand::Commands => r"^!commands$",
            EssentialsCommand::Plugins => r"^!plugins$",
            EssentialsCommand::Reload => r"^!reload$",
            EssentialsCommand::Tpa => r"^!tpa ([\w\d_]+)$",
            EssentialsCommand::TpAccept => r"^!tpaccept$",
            EssentialsCommand::TpDeny => r"^!tpdeny$",
            EssentialsCommand::Info => r"^!info$",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EssentialsCommand::Commands => "Lists commands accessible to a user.",
            EssentialsCommand::Plugins => "Lists all loaded plugins.",
            EssentialsCommand::Reload => "Reloads all plugins.",
            EssentialsCommand::Tpa => "Requests to teleport to another user.",
            EssentialsCommand::TpAccept => "Accepts a teleport request.",
            EssentialsCommand::TpDeny => "Denies a teleport request.",
            EssentialsCommand::Info => "Gets various info about the server.",
        }
    }

    pub fn requires_op(self) -> bool {
        matches!(self, EssentialsCommand::Reload | EssentialsCommand::Info)
    }
}

/// The essentials module.
///
/// Pending teleport requests live in `S`; see [`Essentials::in_memory`] for the usual
/// setup.
pub struct Essentials<S, H>
where
    S: RequestStorage,
    H: ServerHost,
{
    config: EssentialsConfig,
    host: Arc<H>,
    controller: Arc<RequestLifecycleController<S, H>>,
    update_checker: Option<Arc<dyn UpdateChecker>>,
    update_available: AtomicBool,
    sweep_token: Mutex<Option<CancellationToken>>,
}

impl<S, H> Essentials<S, H>
where
    S: RequestStorage + 'static,
    H: ServerHost + 'static,
{
    /// Create the module.
    ///
    /// An explicit `update_checker` wins; otherwise one is built from
    /// `config.update_check` if present.
    pub fn new(
        config: EssentialsConfig,
        storage: Arc<S>,
        host: Arc<H>,
        update_checker: Option<Arc<dyn UpdateChecker>>,
    ) -> Self {
        let update_checker = update_checker.or_else(|| {
            config.update_check.as_ref().map(|cfg| {
                Arc::new(ReqwestUpdateChecker::new(
                    cfg.manifest_url.clone(),
                    cfg.timeout_ms,
                )) as Arc<dyn UpdateChecker>
            })
        });
        let controller = Arc::new(RequestLifecycleController::new(storage, host.clone()));
        Self {
            config,
            host,
            controller,
            update_checker,
            update_available: AtomicBool::new(false),
            sweep_token: Mutex::new(None),
        }
    }

    pub fn controller(&self) -> &Arc<RequestLifecycleController<S, H>> {
        &self.controller
    }

    pub fn config(&self) -> &EssentialsConfig {
        &self.config
    }

    pub fn update_available(&self) -> bool {
        self.update_available.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.sweep_token.lock().is_some()
    }

    /// Register every command and the connect handler with the host.
    pub fn register(self: &Arc<Self>) -> Result<()> {
        for &command in EssentialsCommand::ALL {
            let module = Arc::downgrade(self);
            let handler: CommandHandler = Arc::new(move |event: &CommandEvent| {
                if let Some(module) = module.upgrade() {
                    module.handle(command, event);
                }
            });

            self.host.register_command(Command {
                name: command.name().to_string(),
                pattern: Regex::new(command.pattern())
                    .map_err(|e| anyhow::anyhow!("Invalid pattern for {}: {}", command.name(), e))?,
                description: command.description().to_string(),
                requires_op: command.requires_op(),
                handler,
            });
        }

        let module = Arc::downgrade(self);
        self.host
            .on_player_connected(Arc::new(move |event: &PlayerConnected| {
                if let Some(module) = module.upgrade() {
                    module.handle_connection(event);
                }
            }));

        tracing::info!(
            commands = EssentialsCommand::ALL.len(),
            "Registered essentials commands"
        );
        Ok(())
    }

    /// Check for updates and start the sweep daemon.
    ///
    /// The daemon stops when [`disable`](Self::disable) is called or when `shutdown`
    /// (the host's own shutdown signal) is cancelled. Calling `enable` twice returns
    /// `None` the second time.
    pub async fn enable(&self, shutdown: &CancellationToken) -> Option<JoinHandle<Result<()>>> {
        let token = {
            let mut slot = self.sweep_token.lock();
            if slot.is_some() {
                tracing::warn!("Essentials already enabled");
                return None;
            }
            let token = shutdown.child_token();
            *slot = Some(token.clone());
            token
        };

        if let Some(checker) = &self.update_checker {
            let newer = check_for_update(checker.as_ref(), &self.config.version).await;
            self.update_available.store(newer, Ordering::SeqCst);
        }

        let daemon = Arc::new(SweepDaemon::new(
            self.controller.clone(),
            self.config.daemon.clone(),
            token,
        ));
        tracing::info!(version = %self.config.version, "Essentials enabled");
        Some(daemon.spawn())
    }

    /// Stop the sweep daemon. Pending requests stay in the store.
    pub fn disable(&self) {
        if let Some(token) = self.sweep_token.lock().take() {
            token.cancel();
            tracing::info!("Essentials disabled");
        }
    }

    /// Run the handler for `command`.
    pub fn handle(&self, command: EssentialsCommand, event: &CommandEvent) {
        tracing::debug!(player = %event.player, command = command.name(), "Handling command");

        match command {
            EssentialsCommand::Commands => self.command_commands(event),
            EssentialsCommand::Plugins => self.command_plugins(event),
            EssentialsCommand::Reload => self.command_reload(event),
            EssentialsCommand::Tpa => match event.args.first() {
                // Rejections have already been sent to the player.
                Some(recipient) => {
                    let _ = self.controller.request_teleport(&event.player, recipient);
                }
                None => tracing::warn!("!tpa dispatched without a recipient"),
            },
            EssentialsCommand::TpAccept => {
                let _ = self.controller.accept(&event.player);
            }
            EssentialsCommand::TpDeny => {
                let _ = self.controller.deny(&event.player);
            }
            EssentialsCommand::Info => self.command_info(event),
        }
    }

    /// Tell operators about a pending update when they connect.
    pub fn handle_connection(&self, event: &PlayerConnected) {
        if event.is_op && self.update_available() {
            tracing::debug!(player = %event.player, "Sending update notice");
            self.host.send(&event.player, message::update_available());
        }
    }

    fn command_commands(&self, event: &CommandEvent) {
        let mut seen = HashSet::new();
        let lines: Vec<_> = self
            .host
            .accessible_commands(&event.player)
            .into_iter()
            .filter(|c| seen.insert(c.name.clone()))
            .collect();

        let mut builder = Message::new();
        for (i, command) in lines.iter().enumerate() {
            let suffix = if i + 1 < lines.len() { "\n" } else { "" };
            builder = builder
                .field(format!("{}: ", command.name), Colour::Red)
                .field(format!("{}{}", command.description, suffix), Colour::Gold);
        }
        self.host.send(&event.player, builder);
    }

    fn command_plugins(&self, event: &CommandEvent) {
        let loaded: Vec<_> = self
            .host
            .plugins()
            .into_iter()
            .filter(|p| self.host.is_loaded(&p.name))
            .collect();

        let mut builder = Message::new();
        for (i, plugin) in loaded.iter().enumerate() {
            let suffix = if i + 1 < loaded.len() { "\n" } else { "" };
            builder = builder
                .field(format!("{}\n", plugin.name), Colour::Blue)
                .field("    Developer: ", Colour::Red)
                .field(format!("{}\n", plugin.developer), Colour::Blue)
                .field("    Version: ", Colour::Red)
                .field(format!("{}{}", plugin.version, suffix), Colour::Blue);
        }
        self.host.send(&event.player, builder);
    }

    fn command_reload(&self, event: &CommandEvent) {
        self.host.send(&event.player, message::reloading());

        match self.host.reload() {
            Ok(()) => {
                tracing::info!(player = %event.player, "Plugins reloaded");
                self.host.send(&event.player, message::reloaded());
            }
            Err(e) => {
                tracing::error!(player = %event.player, error = %e, "Plugin reload failed");
                let notice = e
                    .rejection_message()
                    .unwrap_or_else(|| message::reload_failed(&e.to_string()));
                self.host.send(&event.player, notice);
            }
        }
    }

    fn command_info(&self, event: &CommandEvent) {
        let builder = Message::new()
            .field("Server version: ", Colour::Gold)
            .field(format!("{}\n", self.host.server_version()), Colour::Blue)
            .field("OPs: ", Colour::Gold)
            .field(self.host.operator_count().to_string(), Colour::Blue);
        self.host.send(&event.player, builder);
    }
}

impl<H> Essentials<InMemoryRequestStore, H>
where
    H: ServerHost + 'static,
{
    /// Module backed by an in-memory store using the configured request ttl.
    pub fn in_memory(
        config: EssentialsConfig,
        host: Arc<H>,
        update_checker: Option<Arc<dyn UpdateChecker>>,
    ) -> Self {
        let storage = Arc::new(InMemoryRequestStore::with_ttl(config.daemon.request_ttl()));
        Self::new(config, storage, host, update_checker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockServer, PluginManifest};
    use crate::http::MockUpdateChecker;

    fn setup(
        update_checker: Option<Arc<dyn UpdateChecker>>,
    ) -> (Arc<Essentials<InMemoryRequestStore, MockServer>>, Arc<MockServer>) {
        let host = Arc::new(MockServer::new());
        let config = EssentialsConfig {
            version: "0.3.0".to_string(),
            ..Default::default()
        };
        let essentials = Arc::new(Essentials::in_memory(config, host.clone(), update_checker));
        essentials.register().unwrap();
        (essentials, host)
    }

    #[test]
    fn test_registers_every_command() {
        let (_essentials, host) = setup(None);
        assert_eq!(
            host.registered_commands(),
            vec![
                "!commands",
                "!plugins",
                "!reload",
                "!tpa",
                "!tpaccept",
                "!tpdeny",
                "!info"
            ]
        );
    }

    #[test]
    fn test_commands_lists_only_accessible_commands() {
        let (_essentials, host) = setup(None);
        let player = host.add_player("player");

        assert!(host.dispatch(&player, "!commands"));
        let listing = host.messages_for(&player).pop().unwrap();

        assert!(listing.starts_with("!commands: Lists commands accessible to a user.\n"));
        assert!(listing.contains("!tpa: Requests to teleport to another user."));
        assert!(!listing.contains("!reload"));
        assert!(!listing.contains("!info"));
        assert!(!listing.ends_with('\n'));
    }

    #[test]
    fn test_plugins_lists_loaded_plugins_only() {
        let (_essentials, host) = setup(None);
        let player = host.add_player("player");
        host.add_plugin(
            PluginManifest {
                name: "Essentials".to_string(),
                developer: "dev".to_string(),
                version: "0.3.0".to_string(),
            },
            true,
        );
        host.add_plugin(
            PluginManifest {
                name: "Disabled".to_string(),
                developer: "someone".to_string(),
                version: "1.0".to_string(),
            },
            false,
        );

        host.dispatch(&player, "!plugins");
        assert_eq!(
            host.messages_for(&player),
            vec!["Essentials\n    Developer: dev\n    Version: 0.3.0"]
        );
    }

    #[test]
    fn test_reload_and_info_require_op() {
        let (_essentials, host) = setup(None);
        let player = host.add_player("player");
        let admin = host.add_op("admin");
        host.set_server_version("1.20.4");

        assert!(!host.dispatch(&player, "!reload"));
        assert!(!host.dispatch(&player, "!info"));
        assert_eq!(host.reload_count(), 0);

        assert!(host.dispatch(&admin, "!reload"));
        assert_eq!(host.reload_count(), 1);
        assert!(host.dispatch(&admin, "!info"));
        assert_eq!(
            host.messages_for(&admin),
            vec![
                "Reloading all plugins...",
                "Plugins reloaded.",
                "Server version: 1.20.4\nOPs: 1"
            ]
        );
    }

    #[test]
    fn test_failed_reload_is_reported() {
        let (_essentials, host) = setup(None);
        let admin = host.add_op("admin");
        host.fail_next_reload("plugin crashed");

        host.dispatch(&admin, "!reload");
        assert_eq!(
            host.messages_for(&admin),
            vec!["Reloading all plugins...", "Reload failed: plugin crashed"]
        );
    }

    #[test]
    fn test_tpa_pattern_rejects_bad_usernames() {
        let (essentials, host) = setup(None);
        let alice = host.add_player("alice");

        assert!(!host.dispatch(&alice, "!tpa"));
        assert!(!host.dispatch(&alice, "!tpa bob smith"));
        assert!(essentials.controller().storage().is_empty());
    }

    #[tokio::test]
    async fn test_update_notice_only_for_operators() {
        let checker: Arc<dyn UpdateChecker> = Arc::new(MockUpdateChecker::with_version("0.4.0"));
        let (essentials, host) = setup(Some(checker));
        let player = host.add_player("player");
        let admin = host.add_op("admin");

        let shutdown = CancellationToken::new();
        let handle = essentials.enable(&shutdown).await.unwrap();
        assert!(essentials.update_available());

        host.connect(&player);
        host.connect(&admin);
        assert!(host.messages_for(&player).is_empty());
        assert_eq!(
            host.messages_for(&admin),
            vec!["A new version of Essentials is available."]
        );

        essentials.disable();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_no_update_notice_when_current() {
        let checker: Arc<dyn UpdateChecker> = Arc::new(MockUpdateChecker::with_version("0.3.0"));
        let (essentials, host) = setup(Some(checker));
        let admin = host.add_op("admin");

        let shutdown = CancellationToken::new();
        let handle = essentials.enable(&shutdown).await.unwrap();
        host.connect(&admin);
        assert!(host.messages_for(&admin).is_empty());

        // Host shutdown stops the daemon too.
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_enable_twice_is_refused() {
        let (essentials, _host) = setup(None);
        let shutdown = CancellationToken::new();

        let handle = essentials.enable(&shutdown).await.unwrap();
        assert!(essentials.is_enabled());
        assert!(essentials.enable(&shutdown).await.is_none());

        essentials.disable();
        assert!(!essentials.is_enabled());
        handle.await.unwrap().unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_configured_update_check_fetches_manifest() {
        let mut server = mockito::Server::new_async().await;
        let manifest = server
            .mock("GET", "/release.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version":"9.9.9"}"#)
            .create_async()
            .await;

        let config = EssentialsConfig {
            version: "0.3.0".to_string(),
            update_check: Some(UpdateCheckConfig {
                manifest_url: format!("{}/release.json", server.url()),
                timeout_ms: 5000,
            }),
            ..Default::default()
        };
        let host = Arc::new(MockServer::new());
        let essentials = Arc::new(Essentials::in_memory(config, host.clone(), None));
        essentials.register().unwrap();
        let admin = host.add_op("admin");

        let shutdown = CancellationToken::new();
        let handle = essentials.enable(&shutdown).await.unwrap();
        manifest.assert_async().await;
        assert!(essentials.update_available());

        host.connect(&admin);
        assert_eq!(
            host.messages_for(&admin),
            vec!["A new version of Essentials is available."]
        );

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_explicit_checker_overrides_config() {
        let checker = MockUpdateChecker::with_version("0.3.0");
        let config = EssentialsConfig {
            version: "0.3.0".to_string(),
            update_check: Some(UpdateCheckConfig {
                manifest_url: "http://127.0.0.1:1/release.json".to_string(),
                timeout_ms: 100,
            }),
            ..Default::default()
        };
        let host = Arc::new(MockServer::new());
        let explicit: Arc<dyn UpdateChecker> = Arc::new(checker.clone());
        let essentials = Essentials::in_memory(config, host, Some(explicit));

        let shutdown = CancellationToken::new();
        let handle = essentials.enable(&shutdown).await.unwrap();
        assert_eq!(checker.call_count(), 1);
        assert!(!essentials.update_available());

        essentials.disable();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_config_from_json() {
        let config = EssentialsConfig::from_json(
            r#"{
                "daemon": {"request_ttl_ms": 30000},
                "update_check": {"manifest_url": "https://example.com/release.json"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.daemon.request_ttl_ms, 30000);
        assert_eq!(config.daemon.sweep_interval_ms, 5000);
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
        let update_check = config.update_check.unwrap();
        assert_eq!(update_check.timeout_ms, 5000);
    }
}
