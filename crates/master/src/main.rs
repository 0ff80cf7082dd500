mod commands;
mod event_loop;
mod master;
mod relay;
mod server;
mod status;

use std::path::PathBuf;

use argp::FromArgs;
use eveleve_core::config::DEFAULT_CONFIG_PATH;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{master::Master, server::ServerBootstrap};

#[derive(FromArgs, PartialEq, Debug)]
/// Manage your Indie Gamedev Community.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Master(MasterArgs),
}

#[derive(FromArgs, PartialEq, Debug)]
/// Relay CI and repository webhooks to Discord.
#[argp(subcommand, name = "master")]
struct MasterArgs {
    #[argp(option, short = 'c')]
    /// Configuration file (default: /etc/eveleve/config.yaml).
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install crypto provider");

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    match args.command {
        SubCommand::Master(args) => run_master(args).await,
    }
}

async fn run_master(args: MasterArgs) {
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match shutdown_signal().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {e}"),
            }
        }
    });

    let config_path = args.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let bootstrap =
        ServerBootstrap::new(config_path, shutdown.clone()).expect("Failed to set up bootstrap");
    if let Err(e) = Master::new().run(bootstrap, shutdown).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    tracing::info!("Shut down gracefully");
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
