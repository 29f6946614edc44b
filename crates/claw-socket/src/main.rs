//! clawsock - keep a WebSocket feed connected and print what it delivers
//!
//! Every lifecycle event is written to stdout as one JSON line; logs go to
//! stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use claw_socket::{
    ChannelHooks, ConnectionManager, SocketConfig, SocketEvent, SocketHandle, WsTransport,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clawsock")]
#[command(about = "Resilient WebSocket client with reconnect and subscription replay")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "CLAWSOCK_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and stream events until interrupted
    Run {
        /// Path to config file
        #[arg(short, long, conflicts_with = "url")]
        config: Option<PathBuf>,

        /// Endpoint URL (ws:// or wss://)
        #[arg(long, env = "CLAWSOCK_URL")]
        url: Option<String>,

        /// Connection name
        #[arg(long, default_value = "clawsock")]
        name: String,

        /// Subscription request to send once connected; repeatable
        #[arg(short, long = "subscribe")]
        subscriptions: Vec<String>,

        /// Log lifecycle transitions
        #[arg(long)]
        debug: bool,

        /// Log every payload sent and received
        #[arg(long)]
        debug_messages: bool,
    },

    /// Print a sample config file
    InitConfig {
        /// Endpoint URL
        #[arg(long, default_value = "wss://localhost:9443/stream")]
        url: String,

        /// Path to write config; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("claw_socket=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    match cli.command {
        Commands::Run {
            config,
            url,
            name,
            subscriptions,
            debug,
            debug_messages,
        } => {
            let config = match (config, url) {
                (Some(path), _) => SocketConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                (None, Some(url)) => SocketConfig::new(name, url),
                (None, None) => anyhow::bail!("either --config or --url is required"),
            };
            let debug = config.debug_logging || debug;
            let debug_messages = config.debug_message_logging || debug_messages;
            let config = config
                .with_debug_logging(debug)
                .with_debug_message_logging(debug_messages);
            config.validate()?;
            run(config, subscriptions).await?;
        }

        Commands::InitConfig { url, output } => {
            init_config(url, output)?;
        }
    }

    Ok(())
}

async fn run(config: SocketConfig, subscriptions: Vec<String>) -> anyhow::Result<()> {
    info!(
        connection = %config.connection_name,
        url = %config.url,
        "starting clawsock"
    );

    let (hooks, mut events) = ChannelHooks::new();
    let manager = ConnectionManager::new(config, WsTransport::new()).with_hooks(hooks);
    let (socket, task) = SocketHandle::spawn(manager);

    socket.open().await?;
    let mut pending = subscriptions;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if matches!(event, SocketEvent::Opened(_)) && !pending.is_empty() {
                    for request in std::mem::take(&mut pending) {
                        if !socket.subscribe(request.clone()).await? {
                            warn!(request = %request, "subscription not sent");
                        }
                    }
                }
                print_event(&event)?;
            }

            _ = &mut shutdown => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    socket.dispose().await?;
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .context("driver task did not stop")??;

    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }

    Ok(())
}

fn print_event(event: &SocketEvent) -> anyhow::Result<()> {
    let line = serde_json::json!({
        "event": event.name(),
        "notification": event.notification(),
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn init_config(url: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = SocketConfig::new("my-feed", url).with_debug_logging(true);
    let json = config.to_json()?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &json)?;
            println!("Config written to: {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
