//! Text relay - Entry Point
//!
//! `serve` runs the relay server and broadcasts stdin lines;
//! `connect` runs a console chat client.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use text_relay::cli::{Cli, Command, ConnectArgs, ServeArgs};
use text_relay::config::{DEFAULT_LOG_FILTER, QUIT_COMMAND};
use text_relay::console::spawn_renderer;
use text_relay::{ChannelSink, ChatClient, RelayServer};

/// How long to let the renderer drain after shutdown
const RENDER_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=text_relay=trace
    // Logs go to stderr; stdout carries the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Connect(args) => connect(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (sink, events) = ChannelSink::new();
    let renderer = spawn_renderer(events, args.format);

    let server = RelayServer::new(args.host, Arc::new(sink));
    if let Err(e) = server.start(args.port).await {
        drop(server);
        drain(renderer).await;
        return Err(e.into());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => server.broadcast(line.trim_end()).await,
                Ok(None) => {
                    debug!("stdin closed; serving until Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    stdin_open = false;
                }
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    server.stop().await;
    drop(server);
    drain(renderer).await;
    Ok(())
}

async fn connect(args: ConnectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (sink, events) = ChannelSink::new();
    let renderer = spawn_renderer(events, args.format);

    let client = ChatClient::new(Arc::new(sink));
    if let Err(e) = client.connect(&args.host, args.port).await {
        drop(client);
        drain(renderer).await;
        return Err(e.into());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let text = line.trim_end();
                    if text == QUIT_COMMAND {
                        client.leave(&args.username).await;
                        break;
                    }
                    if let Err(e) = client.send(&args.username, text).await {
                        debug!(error = %e, "send failed");
                    }
                    if !client.is_connected() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    client.disconnect().await;
    drop(client);
    drain(renderer).await;
    Ok(())
}

/// Give the renderer a moment to print what is still queued
async fn drain(renderer: JoinHandle<()>) {
    if tokio::time::timeout(RENDER_DRAIN_TIMEOUT, renderer).await.is_err() {
        debug!("renderer still running at exit");
    }
}
