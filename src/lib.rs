//! Minimal TCP Text-Chat Relay Library
//!
//! A server accepts TCP connections, reads length-prefixed UTF-8 frames and
//! rebroadcasts each one to every other connected client. Clients send
//! `"<username>: <text>"` payloads and render a rolling transcript.
//!
//! # Features
//! - 2-byte length-prefixed modified-UTF-8 framing (`writeUTF`-compatible)
//! - One task per connection, with a shared session registry
//! - Server-authored broadcasts (`"Server: ..."`)
//! - Voluntary disconnect via the `": exit"` signal
//! - Display sinks decoupling the core from any front end
//!
//! # Architecture
//! - `RelayServer` owns the listener and the `SessionRegistry`
//! - Each `ClientSession` owns one peer socket and relays what it reads by
//!   calling `send` on a snapshot of the other sessions
//! - `ChatClient` owns one outbound connection and a receive task
//! - Every failure is turned into a notice on a `DisplaySink`; nothing is
//!   fatal to the process
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use text_relay::{ChannelSink, ChatClient, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, mut events) = ChannelSink::new();
//!     let server = RelayServer::new("127.0.0.1", Arc::new(sink.clone()));
//!     let addr = server.start(6666).await.unwrap();
//!
//!     let client = ChatClient::new(Arc::new(sink));
//!     client.connect("127.0.0.1", addr.port()).await.unwrap();
//!     client.send("User 1", "hi").await.unwrap();
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{}: {}", event.sender, event.content);
//!     }
//! }
//! ```

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod console;
pub mod error;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use client::ChatClient;
pub use codec::FrameCodec;
pub use error::{FrameError, RelayError};
pub use message::ChatMessage;
pub use registry::SessionRegistry;
pub use server::RelayServer;
pub use session::ClientSession;
pub use sink::{ChannelSink, DisplayEvent, DisplaySink};
pub use types::SessionId;
