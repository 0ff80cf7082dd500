use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use eveleve_core::{
    RelayError,
    config::Config,
    models::Command,
    notifier::Notifier,
    stream::{EventSender, event_stream},
};
use eveleve_github::{GitHubListener, RepoEvent, TrustedProjects, WebhookSecret};
use eveleve_travis::BuildEvent;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{self, CommandContext},
    event_loop::{EventLoop, Incoming},
    relay::Relay,
};

pub const ONLINE_MESSAGE: &str = "EvelEve Bot Online. All Systems Nominal";

/// Retry delay used before a configuration is available.
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    Starting,
    /// A required collaborator failed to start and is being retried.
    Degraded,
    Running,
    ShuttingDown,
}

/// Creates the collaborators the orchestrator depends on.
///
/// `load_config`, `connect_notifier` and `start_github` are required and
/// retried until they succeed. The rest are attempted once.
#[async_trait]
pub trait Bootstrap: Send {
    async fn load_config(&mut self) -> Result<Arc<Config>>;

    async fn connect_notifier(&mut self, config: &Config) -> Result<Arc<dyn Notifier>>;

    async fn start_github(&mut self, config: &Config, listener: GitHubListener) -> Result<()>;

    async fn start_travis(
        &mut self,
        config: &Config,
        builds: EventSender<BuildEvent>,
    ) -> Result<()>;

    async fn start_commands(
        &mut self,
        config: &Config,
        commands: EventSender<Command>,
    ) -> Result<()>;

    async fn start_status(
        &mut self,
        config: &Config,
        notifier: Arc<dyn Notifier>,
        started: Instant,
    ) -> Result<()>;

    /// Stop everything that was started. Called once on the way out.
    async fn shutdown(&mut self);
}

struct Senders {
    commands: EventSender<Command>,
    repo: EventSender<RepoEvent>,
    builds: EventSender<BuildEvent>,
}

/// Collaborators brought up so far.
#[derive(Default)]
struct Startup {
    config: Option<Arc<Config>>,
    trusted: Option<Arc<TrustedProjects>>,
    senders: Option<Senders>,
    events: Option<EventLoop>,
    notifier: Option<Arc<dyn Notifier>>,
    github: bool,
}

struct Running {
    config: Arc<Config>,
    trusted: Arc<TrustedProjects>,
    // Listeners hold clones; keeping these open means the streams only
    // close when the orchestrator stops.
    _senders: Senders,
    relay: Relay,
}

/// The orchestrator: brings up the collaborators, then relays events until
/// shutdown.
pub struct Master {
    state: watch::Sender<MasterState>,
    started: Instant,
}

impl Default for Master {
    fn default() -> Self { Self::new() }
}

impl Master {
    pub fn new() -> Self {
        Self { state: watch::Sender::new(MasterState::Starting), started: Instant::now() }
    }

    pub fn subscribe(&self) -> watch::Receiver<MasterState> { self.state.subscribe() }

    fn set_state(&self, state: MasterState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::info!("Master state: {previous:?} -> {state:?}");
        }
    }

    pub async fn run<B: Bootstrap>(self, mut bootstrap: B, shutdown: CancellationToken) -> Result<()> {
        tracing::info!("Starting EvelEve in Master mode");
        tracing::info!("App version: {}", commands::VERSION);
        let mut startup = Startup::default();
        let running = loop {
            if shutdown.is_cancelled() {
                break None;
            }
            match self.advance(&mut bootstrap, &mut startup).await {
                Ok(()) => break std::mem::take(&mut startup).into_running(),
                Err(e) => {
                    tracing::error!("{e:#}");
                    self.set_state(MasterState::Degraded);
                    let retry = startup
                        .config
                        .as_ref()
                        .map_or(DEFAULT_RETRY_INTERVAL, |c| c.relay.retry_interval());
                    tokio::select! {
                        _ = shutdown.cancelled() => break None,
                        _ = tokio::time::sleep(retry) => {}
                    }
                }
            }
        };
        // Pending rendezvous sends fail once the receivers are gone
        drop(startup);
        if let Some((running, mut events)) = running {
            self.set_state(MasterState::Running);
            while let Some(incoming) = events.next(&shutdown).await {
                self.dispatch(&running, incoming).await;
            }
        }
        self.set_state(MasterState::ShuttingDown);
        bootstrap.shutdown().await;
        tracing::info!("Master stopped");
        Ok(())
    }

    /// Bring up whatever is still missing, in dependency order.
    async fn advance<B: Bootstrap>(&self, bootstrap: &mut B, startup: &mut Startup) -> Result<()> {
        let config = match startup.config.clone() {
            Some(config) => config,
            None => {
                let config = bootstrap
                    .load_config()
                    .await
                    .map_err(RelayError::ConfigUnavailable)?;
                self.configured(bootstrap, startup, config.clone()).await;
                config
            }
        };
        let senders = startup.senders.as_ref().context("Event streams missing")?;

        let notifier = match startup.notifier.clone() {
            Some(notifier) => notifier,
            None => {
                let notifier = bootstrap
                    .connect_notifier(&config)
                    .await
                    .map_err(RelayError::NotifierUnavailable)?;
                if let Err(e) =
                    notifier.send_text(&config.discord.log_channel, ONLINE_MESSAGE).await
                {
                    tracing::error!("Failed to send log message: {e:#}");
                }
                if let Err(e) =
                    bootstrap.start_status(&config, notifier.clone(), self.started).await
                {
                    tracing::error!("Failed to start status updates: {e:#}");
                }
                if let Err(e) = bootstrap.start_commands(&config, senders.commands.clone()).await {
                    tracing::warn!("Commands are unavailable: {e:#}");
                }
                startup.notifier = Some(notifier.clone());
                notifier
            }
        };

        if !startup.github {
            let trusted = startup.trusted.clone().unwrap_or_default();
            let listener = GitHubListener::new(
                WebhookSecret::new(&config.github.secret),
                trusted,
                notifier,
                config.discord.log_channel.clone(),
                senders.repo.clone(),
            );
            bootstrap
                .start_github(&config, listener)
                .await
                .context("Failed to initialize GitHub subsystem")?;
            startup.github = true;
        }
        Ok(())
    }

    /// Set up what depends only on the configuration. The CI listener is
    /// started here, once.
    async fn configured<B: Bootstrap>(
        &self,
        bootstrap: &mut B,
        startup: &mut Startup,
        config: Arc<Config>,
    ) {
        let depth = config.relay.queue_depth;
        let (commands, commands_rx) = event_stream(depth);
        let (repo, repo_rx) = event_stream(depth);
        let (builds, builds_rx) = event_stream(depth);
        if let Err(e) = bootstrap.start_travis(&config, builds.clone()).await {
            tracing::error!("Failed to initialize Travis subsystem: {e:#}");
        }
        startup.trusted = Some(Arc::new(TrustedProjects::from_config(&config.projects)));
        startup.senders = Some(Senders { commands, repo, builds });
        startup.events = Some(EventLoop::new(commands_rx, repo_rx, builds_rx));
        startup.config = Some(config);
    }

    async fn dispatch(&self, running: &Running, incoming: Incoming) {
        match incoming {
            Incoming::Command(command) => {
                tracing::info!("Handling command {}", command.verb);
                let ctx = CommandContext {
                    config: &running.config,
                    trusted: &running.trusted,
                    uptime: self.started.elapsed(),
                };
                if let Some(reply) = commands::handle(&command, &ctx) {
                    let channel = command
                        .channel
                        .as_deref()
                        .unwrap_or(running.config.discord.command_channel());
                    running.relay.send_text(channel, &reply).await;
                }
            }
            Incoming::Repo(event) => running.relay.repo_event(&event).await,
            Incoming::Build(build) => running.relay.build(&build).await,
        }
    }
}

impl Startup {
    fn into_running(self) -> Option<(Running, EventLoop)> {
        let config = self.config?;
        let notifier = self.notifier?;
        let running = Running {
            relay: Relay::new(notifier, &config.discord),
            trusted: self.trusted?,
            _senders: self.senders?,
            config,
        };
        Some((running, self.events?))
    }
}
