use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use eveleve_core::{config::Config, models::Command, notifier::Notifier, stream::EventSender};
use eveleve_discord::{CommandPoller, DiscordClient};
use eveleve_github::GitHubListener;
use eveleve_travis::{BuildEvent, TravisKeySource, TravisListener};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};

use crate::{
    master::Bootstrap,
    status::{self, StatusBoard},
};

/// How long in-flight requests get to finish after shutdown is requested.
const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Brings up the real listeners, the Discord client and the heartbeat.
pub struct ServerBootstrap {
    config_path: PathBuf,
    shutdown: CancellationToken,
    http: reqwest::Client,
    discord: Option<Arc<DiscordClient>>,
    scheduler: Option<JobScheduler>,
    tasks: JoinSet<()>,
}

impl ServerBootstrap {
    pub fn new(config_path: PathBuf, shutdown: CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("eveleve/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            config_path,
            shutdown,
            http,
            discord: None,
            scheduler: None,
            tasks: JoinSet::new(),
        })
    }
}

#[async_trait]
impl Bootstrap for ServerBootstrap {
    async fn load_config(&mut self) -> Result<Arc<Config>> {
        Config::load(&self.config_path).map(Arc::new)
    }

    async fn connect_notifier(&mut self, config: &Config) -> Result<Arc<dyn Notifier>> {
        let client = Arc::new(DiscordClient::new(&config.discord)?);
        client.connect().await?;
        self.discord = Some(client.clone());
        Ok(client)
    }

    async fn start_github(&mut self, config: &Config, listener: GitHubListener) -> Result<()> {
        let tls = RustlsConfig::from_pem_file(&config.tls.cert, &config.tls.key)
            .await
            .with_context(|| format!("Failed to load TLS key pair {}", config.tls.cert))?;
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.github.port));
        let socket = std::net::TcpListener::bind(addr)
            .with_context(|| format!("Failed to bind GitHub listener to {addr}"))?;
        socket.set_nonblocking(true)?;
        tracing::info!("GitHub webhooks: Listening on https://{addr}{}", config.github.path);

        let router = app(listener.router(&config.github.path));
        let handle = Handle::new();
        let server = axum_server::from_tcp_rustls(socket, tls).handle(handle.clone());
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(GRACE_PERIOD));
        });
        self.tasks.spawn(async move {
            if let Err(e) =
                server.serve(router.into_make_service_with_connect_info::<SocketAddr>()).await
            {
                tracing::error!("GitHub webhook server error: {e}");
            }
            tracing::info!("GitHub webhook server stopped");
        });
        Ok(())
    }

    async fn start_travis(
        &mut self,
        config: &Config,
        builds: EventSender<BuildEvent>,
    ) -> Result<()> {
        let keys = Arc::new(TravisKeySource::new(self.http.clone(), &config.travis));
        let router = app(TravisListener::new(keys, builds).router(&config.travis.path));
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.travis.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind Travis listener to {addr}"))?;
        tracing::info!("Travis webhooks: Listening on http://{addr}{}", config.travis.path);
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
            if let Err(e) = result {
                tracing::error!("Travis webhook server error: {e}");
            }
            tracing::info!("Travis webhook server stopped");
        });
        Ok(())
    }

    async fn start_commands(
        &mut self,
        config: &Config,
        commands: EventSender<Command>,
    ) -> Result<()> {
        let client = self.discord.clone().context("Discord client not connected")?;
        let poller = CommandPoller::new(
            client,
            config.discord.command_channel(),
            Duration::from_secs(config.discord.command_poll_secs.max(1)),
        );
        self.tasks.spawn(poller.run(commands, self.shutdown.clone()));
        Ok(())
    }

    async fn start_status(
        &mut self,
        config: &Config,
        notifier: Arc<dyn Notifier>,
        started: Instant,
    ) -> Result<()> {
        let board = Arc::new(StatusBoard::new(notifier, &config.discord.status_channel, started));
        if let Err(e) = board.clear().await {
            tracing::warn!("Failed to clear status channel: {e:#}");
        }
        board.update().await?;
        let every = Duration::from_secs(config.discord.status_interval_secs.max(1));
        self.scheduler = Some(status::schedule(board, every).await?);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take()
            && let Err(e) = scheduler.shutdown().await
        {
            tracing::error!("Failed to shut down scheduler: {e}");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Task failed: {e}");
            }
        }
    }
}

fn app(router: Router) -> Router {
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION].into();
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(WebhookSpan { level: Level::INFO })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(60)));
    router.layer(middleware)
}

/// Request span carrying the peer address and the provider's delivery id.
#[derive(Debug, Clone)]
pub struct WebhookSpan {
    level: Level,
}

impl<B> MakeSpan<B> for WebhookSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::from([0, 0, 0, 0]), |ConnectInfo(addr)| addr.ip());
        let delivery = request
            .headers()
            .get("X-GitHub-Delivery")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[unknown]");
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "webhook",
                    method = %request.method(),
                    uri = %request.uri(),
                    ip = %ip,
                    delivery = %delivery,
                    user_agent = %user_agent,
                )
            }
        }
        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
