//! Command-line interface

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server; lines typed on stdin are broadcast as "Server: ..."
    Serve(ServeArgs),
    /// Connect to a relay server; lines typed on stdin are sent as chat messages
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long, default_value = config::DEFAULT_BIND_HOST)]
    pub host: String,

    /// Port to listen on. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = config::DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// How the transcript is printed.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Host of the relay server.
    #[arg(long, default_value = config::DEFAULT_CONNECT_HOST)]
    pub host: String,

    /// Port of the relay server.
    #[arg(long, default_value_t = config::DEFAULT_CLIENT_PORT)]
    pub port: u16,

    /// Name attached to every message sent.
    #[arg(long, default_value = config::DEFAULT_USERNAME)]
    pub username: String,

    /// How the transcript is printed.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Transcript rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per event
    Text,
    /// One JSON object per line
    Json,
}
